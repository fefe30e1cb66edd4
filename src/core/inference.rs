//! Inference client: an opaque submit/wait facade over accelerated sessions.
//!
//! Each loaded model owns one dedicated worker thread and a bounded job
//! queue. [`ModelHandle::submit`] enqueues a tensor and returns an
//! [`InferJob`]; [`InferJob::wait`] blocks the calling stage worker until the
//! output for exactly that job is available. Because a model's jobs are
//! executed by a single worker pulling from a FIFO queue, completion order is
//! FIFO per model and a job can never observe another job's output.
//!
//! The session itself sits behind [`SessionBackend`] so that pipeline and
//! scheduler tests can substitute a synthetic backend without any model
//! files.

use crate::core::config::OrtSessionConfig;
use crate::core::errors::{OcrError, OcrResult};
use crate::core::Tensor4D;
use crossbeam_channel::{bounded, Receiver, Sender};
use ndarray::ArrayD;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Capacity of a model's submission queue. `submit` blocks once this many
/// jobs are in flight for the model.
const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// A single forward pass executor.
///
/// One backend instance is owned by exactly one inference worker thread, so
/// implementations need no internal locking.
pub trait SessionBackend: Send + 'static {
    /// Runs one forward pass and returns the output tensor.
    fn run(&mut self, input: Tensor4D) -> OcrResult<ArrayD<f32>>;
}

/// ONNX Runtime backed session.
pub struct OrtBackend {
    session: Session,
    input_name: String,
    output_name: String,
    model_name: String,
}

impl OrtBackend {
    /// Loads a model file and resolves its input/output tensor names.
    pub fn load(
        model_path: &Path,
        model_name: &str,
        ort_config: &OrtSessionConfig,
    ) -> OcrResult<Self> {
        let mut builder = Session::builder()?;
        if let Some(intra) = ort_config.intra_threads {
            builder = builder.with_intra_threads(intra)?;
        }
        if let Some(inter) = ort_config.inter_threads {
            builder = builder.with_inter_threads(inter)?;
        }
        if let Some(parallel) = ort_config.parallel_execution {
            builder = builder.with_parallel_execution(parallel)?;
        }
        let session = builder.commit_from_file(model_path)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| {
                OcrError::config(format!(
                    "model '{}' at {} declares no inputs",
                    model_name,
                    model_path.display()
                ))
            })?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| {
                OcrError::config(format!(
                    "model '{}' at {} declares no outputs",
                    model_name,
                    model_path.display()
                ))
            })?;

        debug!(
            model = model_name,
            path = %model_path.display(),
            input = %input_name,
            output = %output_name,
            "model loaded"
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            model_name: model_name.to_string(),
        })
    }
}

impl SessionBackend for OrtBackend {
    fn run(&mut self, input: Tensor4D) -> OcrResult<ArrayD<f32>> {
        let input_shape = input.shape().to_vec();
        let input_tensor = TensorRef::from_array_view(input.view()).map_err(|e| {
            OcrError::inference(
                &self.model_name,
                format!("input tensor conversion for shape {input_shape:?}: {e}"),
            )
        })?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| {
                OcrError::inference(
                    &self.model_name,
                    format!("forward pass with input shape {input_shape:?}: {e}"),
                )
            })?;

        let (output_shape, output_data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                OcrError::inference(
                    &self.model_name,
                    format!("output '{}' extraction as f32: {e}", self.output_name),
                )
            })?;

        let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();
        ArrayD::from_shape_vec(ndarray::IxDyn(&dims), output_data.to_vec())
            .map_err(OcrError::Tensor)
    }
}

struct JobRequest {
    input: Tensor4D,
    reply: Sender<OcrResult<ArrayD<f32>>>,
}

/// A pending inference job. Dropping the job abandons its output.
pub struct InferJob {
    model: Arc<str>,
    reply: Receiver<OcrResult<ArrayD<f32>>>,
}

impl InferJob {
    /// Blocks until this job's output is available.
    pub fn wait(self) -> OcrResult<ArrayD<f32>> {
        let model = self.model.clone();
        self.reply.recv().map_err(|_| OcrError::EngineShutdown {
            model: model.to_string(),
        })?
    }

    /// Waits and adapts the output to a 2D tensor (batch, classes).
    pub fn wait_2d(self) -> OcrResult<crate::core::Tensor2D> {
        let model = self.model.clone();
        self.wait()?
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| OcrError::inference(model.to_string(), format!("expected 2D output: {e}")))
    }

    /// Waits and adapts the output to a 3D tensor (batch, sequence, classes).
    pub fn wait_3d(self) -> OcrResult<crate::core::Tensor3D> {
        let model = self.model.clone();
        self.wait()?
            .into_dimensionality::<ndarray::Ix3>()
            .map_err(|e| OcrError::inference(model.to_string(), format!("expected 3D output: {e}")))
    }

    /// Waits and adapts the output to a 4D tensor (batch, channels, h, w).
    pub fn wait_4d(self) -> OcrResult<Tensor4D> {
        let model = self.model.clone();
        self.wait()?
            .into_dimensionality::<ndarray::Ix4>()
            .map_err(|e| OcrError::inference(model.to_string(), format!("expected 4D output: {e}")))
    }
}

struct ModelInner {
    name: Arc<str>,
    submit_tx: Sender<JobRequest>,
}

/// Handle to a loaded model. Cloning is cheap; the underlying worker thread
/// exits once every handle has been dropped and its queue drains.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<ModelInner>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.inner.name)
            .finish()
    }
}

impl ModelHandle {
    /// Loads a model file with the ONNX Runtime backend.
    pub fn load(
        model_path: &Path,
        model_name: &str,
        ort_config: &OrtSessionConfig,
    ) -> OcrResult<Self> {
        let backend = OrtBackend::load(model_path, model_name, ort_config)?;
        Ok(Self::with_backend(backend, model_name, DEFAULT_QUEUE_CAPACITY))
    }

    /// Wraps an arbitrary backend. Used directly by tests with synthetic
    /// backends; production code goes through [`ModelHandle::load`].
    pub fn with_backend<B: SessionBackend>(
        mut backend: B,
        model_name: &str,
        queue_capacity: usize,
    ) -> Self {
        let (submit_tx, submit_rx) = bounded::<JobRequest>(queue_capacity.max(1));
        let name: Arc<str> = Arc::from(model_name);
        let worker_name = format!("infer-{model_name}");
        let thread_model = name.clone();

        // The worker owns the session exclusively. Jobs are answered in
        // submission order; a receiver that was dropped is skipped.
        let spawned = thread::Builder::new().name(worker_name).spawn(move || {
            for job in submit_rx {
                let result = backend.run(job.input);
                if job.reply.send(result).is_err() {
                    debug!(model = %thread_model, "job reply abandoned");
                }
            }
            debug!(model = %thread_model, "inference worker exited");
        });
        if let Err(e) = spawned {
            warn!(model = %name, error = %e, "failed to spawn inference worker");
        }

        Self {
            inner: Arc::new(ModelInner { name, submit_tx }),
        }
    }

    /// Submits a tensor for inference. Blocks only while the model's
    /// submission queue is full.
    pub fn submit(&self, input: Tensor4D) -> OcrResult<InferJob> {
        let (reply_tx, reply_rx) = bounded(1);
        self.inner
            .submit_tx
            .send(JobRequest {
                input,
                reply: reply_tx,
            })
            .map_err(|_| OcrError::EngineShutdown {
                model: self.inner.name.to_string(),
            })?;
        Ok(InferJob {
            model: self.inner.name.clone(),
            reply: reply_rx,
        })
    }

    /// Convenience for submit-then-wait on a 4D-output model.
    pub fn infer_4d(&self, input: Tensor4D) -> OcrResult<Tensor4D> {
        self.submit(input)?.wait_4d()
    }

    /// Convenience for submit-then-wait on a 3D-output model.
    pub fn infer_3d(&self, input: Tensor4D) -> OcrResult<crate::core::Tensor3D> {
        self.submit(input)?.wait_3d()
    }

    /// Convenience for submit-then-wait on a 2D-output model.
    pub fn infer_2d(&self, input: Tensor4D) -> OcrResult<crate::core::Tensor2D> {
        self.submit(input)?.wait_2d()
    }

    /// The model's name, used in error attribution and logs.
    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    /// Backend that labels each output with a running sequence number.
    struct SequenceBackend {
        counter: f32,
    }

    impl SessionBackend for SequenceBackend {
        fn run(&mut self, _input: Tensor4D) -> OcrResult<ArrayD<f32>> {
            self.counter += 1.0;
            Ok(ArrayD::from_elem(ndarray::IxDyn(&[1, 1]), self.counter))
        }
    }

    #[test]
    fn jobs_complete_in_submission_order() {
        let handle = ModelHandle::with_backend(SequenceBackend { counter: 0.0 }, "seq", 4);

        let jobs: Vec<_> = (0..8)
            .map(|_| handle.submit(Array4::zeros((1, 3, 4, 4))).unwrap())
            .collect();

        for (i, job) in jobs.into_iter().enumerate() {
            let out = job.wait_2d().unwrap();
            assert_eq!(out[[0, 0]], (i + 1) as f32);
        }
    }

    #[test]
    fn backend_error_is_delivered_to_the_job() {
        struct Failing;
        impl SessionBackend for Failing {
            fn run(&mut self, _input: Tensor4D) -> OcrResult<ArrayD<f32>> {
                Err(OcrError::inference("failing", "boom"))
            }
        }

        let handle = ModelHandle::with_backend(Failing, "failing", 1);
        // A backend error is delivered to the job, not the handle.
        let err = handle
            .submit(Array4::zeros((1, 3, 2, 2)))
            .unwrap()
            .wait()
            .unwrap_err();
        assert!(matches!(err, OcrError::Inference { .. }));
    }

    #[test]
    fn dimension_adapters_reject_mismatched_ranks() {
        let handle = ModelHandle::with_backend(SequenceBackend { counter: 0.0 }, "seq", 2);
        let err = handle
            .submit(Array4::zeros((1, 3, 2, 2)))
            .unwrap()
            .wait_4d()
            .unwrap_err();
        assert!(matches!(err, OcrError::Inference { .. }));
    }
}
