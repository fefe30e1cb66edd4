//! Request coordinator: binds scheduler results back to their callers.
//!
//! The coordinator owns the submission-to-reply identity mapping. It
//! allocates monotonic task ids, submits to the shared scheduler, and parks
//! request threads on a condition variable until a dedicated collector
//! thread has moved their result from the scheduler's result channel into
//! the shared store. Results nobody claimed (a caller that timed out) are
//! swept once their TTL expires.

use crate::errors::ApiError;
use axon_ocr::pipeline::{AsyncScheduler, PushError, TaskConfig, TaskResult};
use image::RgbImage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default per-request wait deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long an unclaimed result survives before the collector sweeps it.
const RESULT_TTL: Duration = Duration::from_secs(60);

/// How long the collector blocks per poll; bounds shutdown latency.
const COLLECT_POLL: Duration = Duration::from_millis(100);

struct StoredResult {
    result: TaskResult,
    stored_at: Instant,
}

#[derive(Default)]
struct ResultStore {
    map: Mutex<HashMap<u64, StoredResult>>,
    ready: Condvar,
}

/// Coordinates concurrent HTTP requests over one shared scheduler.
pub struct RequestCoordinator {
    scheduler: Arc<AsyncScheduler>,
    next_id: AtomicU64,
    store: Arc<ResultStore>,
    running: Arc<AtomicBool>,
    collector: Mutex<Option<JoinHandle<()>>>,
}

impl RequestCoordinator {
    /// Creates the coordinator and starts its collector thread.
    pub fn new(scheduler: Arc<AsyncScheduler>) -> Arc<Self> {
        let store = Arc::new(ResultStore::default());
        let running = Arc::new(AtomicBool::new(true));

        let collector_store = store.clone();
        let collector_running = running.clone();
        let collector_scheduler = scheduler.clone();
        let collector = std::thread::Builder::new()
            .name("result-collector".to_string())
            .spawn(move || {
                collector_loop(collector_scheduler, collector_store, collector_running)
            })
            .ok();
        if collector.is_none() {
            warn!("failed to start result collector thread");
        }

        Arc::new(Self {
            scheduler,
            next_id: AtomicU64::new(0),
            store,
            running,
            collector: Mutex::new(collector),
        })
    }

    /// Allocates a fresh task id. Ids are never reused within the process.
    pub fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Submits a task; the image and config are frozen from here on.
    pub fn submit(&self, image: RgbImage, config: TaskConfig) -> Result<u64, ApiError> {
        let id = self.allocate_id();
        debug!(task_id = id, "submitting task");
        self.scheduler
            .push_timeout(image, id, config, Duration::from_secs(2))
            .map_err(|e| match e {
                PushError::Full => ApiError::QueueFull,
                PushError::Closed => ApiError::Internal("scheduler is stopped".to_string()),
            })?;
        Ok(id)
    }

    /// Blocks until the result for `id` is available or `deadline` passes.
    ///
    /// Times out without cancelling the task: the result still arrives in
    /// the store later and is swept by the collector's TTL pass.
    pub fn wait_for(&self, id: u64, deadline: Instant) -> Result<TaskResult, ApiError> {
        let mut guard = self
            .store
            .map
            .lock()
            .map_err(|_| ApiError::Internal("result store poisoned".to_string()))?;

        loop {
            if let Some(stored) = guard.remove(&id) {
                return Ok(stored.result);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(task_id = id, "timed out waiting for result");
                return Err(ApiError::Timeout);
            }
            let (next_guard, wait) = self
                .store
                .ready
                .wait_timeout(guard, deadline - now)
                .map_err(|_| ApiError::Internal("result store poisoned".to_string()))?;
            guard = next_guard;
            if wait.timed_out() {
                // One final check before reporting the timeout.
                if let Some(stored) = guard.remove(&id) {
                    return Ok(stored.result);
                }
                warn!(task_id = id, "timed out waiting for result");
                return Err(ApiError::Timeout);
            }
        }
    }

    /// Submits and waits with the given timeout; the common request path.
    pub fn submit_and_wait(
        &self,
        image: RgbImage,
        config: TaskConfig,
        timeout: Duration,
    ) -> Result<TaskResult, ApiError> {
        let id = self.submit(image, config)?;
        self.wait_for(id, Instant::now() + timeout)
    }

    /// The underlying scheduler, for stats and shutdown.
    pub fn scheduler(&self) -> &Arc<AsyncScheduler> {
        &self.scheduler
    }

    /// Stops the collector and drains the scheduler.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.scheduler.stop();
        if let Ok(mut guard) = self.collector.lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.join();
            }
        }
        info!("request coordinator shut down");
    }
}

impl Drop for RequestCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn collector_loop(
    scheduler: Arc<AsyncScheduler>,
    store: Arc<ResultStore>,
    running: Arc<AtomicBool>,
) {
    info!("result collector started");
    let mut last_sweep = Instant::now();

    while running.load(Ordering::SeqCst) {
        if let Some(result) = scheduler.get_result_timeout(COLLECT_POLL) {
            debug!(task_id = result.id, ok = result.is_ok(), "collected result");
            if let Ok(mut guard) = store.map.lock() {
                guard.insert(
                    result.id,
                    StoredResult {
                        result,
                        stored_at: Instant::now(),
                    },
                );
            }
            store.ready.notify_all();
        }

        if last_sweep.elapsed() >= RESULT_TTL {
            if let Ok(mut guard) = store.map.lock() {
                let before = guard.len();
                guard.retain(|_, stored| stored.stored_at.elapsed() < RESULT_TTL);
                let swept = before - guard.len();
                if swept > 0 {
                    warn!(swept, "swept unclaimed results");
                }
            }
            last_sweep = Instant::now();
        }
    }

    // Final drain so stop() accounting stays intact even when results were
    // never claimed.
    while let Some(result) = scheduler.try_get_result() {
        debug!(task_id = result.id, "drained result at shutdown");
    }
    info!("result collector stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_ocr::pipeline::SchedulerConfig;

    // Coordinator tests run over a real scheduler with synthetic model
    // backends, exercising the id round trip end to end.
    fn coordinator() -> Arc<RequestCoordinator> {
        let components = axon_ocr_test_components();
        let scheduler = Arc::new(AsyncScheduler::start(components, SchedulerConfig::default()));
        RequestCoordinator::new(scheduler)
    }

    fn axon_ocr_test_components() -> Arc<axon_ocr::pipeline::PipelineComponents> {
        use axon_ocr::core::{ModelHandle, OcrResult, SessionBackend, Tensor4D};
        use axon_ocr::pipeline::PipelineComponents;
        use axon_ocr::predictor::{TextDetector, TextRecognizer, REC_RATIO_BUCKETS};
        use axon_ocr::processors::CtcDecoder;
        use ndarray::ArrayD;

        struct EmptyMap;
        impl SessionBackend for EmptyMap {
            fn run(&mut self, input: Tensor4D) -> OcrResult<ArrayD<f32>> {
                let (h, w) = (input.shape()[2], input.shape()[3]);
                Ok(ArrayD::zeros(ndarray::IxDyn(&[1, 1, h, w])))
            }
        }
        struct Blank;
        impl SessionBackend for Blank {
            fn run(&mut self, _input: Tensor4D) -> OcrResult<ArrayD<f32>> {
                Ok(ArrayD::zeros(ndarray::IxDyn(&[1, 2, 2])))
            }
        }

        let detector = TextDetector::new(
            ModelHandle::with_backend(EmptyMap, "det-640", 2),
            ModelHandle::with_backend(EmptyMap, "det-960", 2),
        );
        let variants = REC_RATIO_BUCKETS
            .iter()
            .map(|&r| (r, ModelHandle::with_backend(Blank, "rec", 2)))
            .collect();
        let recognizer =
            TextRecognizer::new(variants, CtcDecoder::from_tokens(vec!["a".into()])).unwrap();

        Arc::new(PipelineComponents {
            detector,
            recognizer,
            doc_orientation: None,
            rectifier: None,
            textline_orientation: None,
        })
    }

    #[test]
    fn ids_are_monotonic_and_unique() {
        let coordinator = coordinator();
        let a = coordinator.allocate_id();
        let b = coordinator.allocate_id();
        assert!(b > a);
        coordinator.shutdown();
    }

    #[test]
    fn submit_and_wait_returns_the_matching_result() {
        let coordinator = coordinator();
        let result = coordinator
            .submit_and_wait(
                RgbImage::new(320, 240),
                TaskConfig::default(),
                Duration::from_secs(10),
            )
            .unwrap();
        assert!(result.is_ok());
        assert!(result.entries.is_empty());
        coordinator.shutdown();
    }

    #[test]
    fn concurrent_callers_get_their_own_results() {
        let coordinator = coordinator();
        let mut threads = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            threads.push(std::thread::spawn(move || {
                for _ in 0..4 {
                    let id = coordinator
                        .submit(RgbImage::new(160, 120), TaskConfig::default())
                        .unwrap();
                    let result = coordinator
                        .wait_for(id, Instant::now() + Duration::from_secs(10))
                        .unwrap();
                    assert_eq!(result.id, id);
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
        coordinator.shutdown();
    }

    #[test]
    fn waiting_for_an_unknown_id_times_out() {
        let coordinator = coordinator();
        let err = coordinator
            .wait_for(99_999, Instant::now() + Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout));
        coordinator.shutdown();
    }
}
