//! The OCR pipeline: synchronous driver and asynchronous scheduler.

pub mod config;
pub mod ocr;
pub mod result;
pub mod scheduler;

pub use config::{SchedulerConfig, StageConcurrency, TaskConfig};
pub use ocr::{OcrOutput, OcrPipeline, PipelineComponents, PipelineStats};
pub use result::{sort_reading_order, TaskFailure, TaskResult, TextEntry};
pub use scheduler::{AsyncScheduler, PushError, SchedulerStats};

/// Shared fixtures for pipeline and scheduler tests: components built over
/// synthetic inference backends so no model files are required.
#[cfg(test)]
pub(crate) mod testing {
    use crate::core::{ModelHandle, OcrResult, SessionBackend, Tensor4D};
    use crate::pipeline::ocr::PipelineComponents;
    use crate::predictor::{TextDetector, TextRecognizer, REC_RATIO_BUCKETS};
    use crate::processors::CtcDecoder;
    use ndarray::ArrayD;
    use std::sync::Arc;

    /// Detection backend painting one high-probability block per region,
    /// scaled to the model input resolution.
    pub struct BlockDetBackend {
        /// Fractional (y0, y1, x0, x1) regions.
        pub blocks: Vec<(f32, f32, f32, f32)>,
    }

    impl SessionBackend for BlockDetBackend {
        fn run(&mut self, input: Tensor4D) -> OcrResult<ArrayD<f32>> {
            let (h, w) = (input.shape()[2], input.shape()[3]);
            let mut out = ArrayD::zeros(ndarray::IxDyn(&[1, 1, h, w]));
            for &(y0, y1, x0, x1) in &self.blocks {
                for y in (y0 * h as f32) as usize..(y1 * h as f32) as usize {
                    for x in (x0 * w as f32) as usize..(x1 * w as f32) as usize {
                        out[[0, 0, y, x]] = 0.95;
                    }
                }
            }
            Ok(out)
        }
    }

    /// Recognition backend emitting a fixed CTC sequence for `text` with the
    /// given peak probability at every kept position.
    pub struct FixedTextBackend {
        pub sequence: Vec<usize>,
        pub classes: usize,
        pub peak: f32,
    }

    impl FixedTextBackend {
        pub fn for_text(text: &str, tokens: &[String], peak: f32) -> Self {
            let classes = tokens.len() + 1;
            let mut sequence = Vec::new();
            let mut previous = 0usize;
            for ch in text.chars() {
                let class = tokens
                    .iter()
                    .position(|t| t.chars().next() == Some(ch))
                    .map(|i| i + 1)
                    .unwrap_or(0);
                if class == previous {
                    sequence.push(0);
                }
                sequence.push(class);
                previous = class;
            }
            Self {
                sequence,
                classes,
                peak,
            }
        }
    }

    impl SessionBackend for FixedTextBackend {
        fn run(&mut self, _input: Tensor4D) -> OcrResult<ArrayD<f32>> {
            let steps = self.sequence.len().max(1);
            let rest = (1.0 - self.peak) / (self.classes - 1) as f32;
            let mut out = ArrayD::from_elem(ndarray::IxDyn(&[1, steps, self.classes]), rest);
            for (t, &class) in self.sequence.iter().enumerate() {
                out[[0, t, class]] = self.peak;
            }
            if self.sequence.is_empty() {
                out[[0, 0, 0]] = self.peak;
            }
            Ok(out)
        }
    }

    /// Builds components whose detector finds `blocks` and whose recognizer
    /// always reads `text` at the given confidence.
    pub fn test_components(
        blocks: Vec<(f32, f32, f32, f32)>,
        text: &str,
        peak: f32,
    ) -> Arc<PipelineComponents> {
        let tokens: Vec<String> = {
            let mut seen = Vec::new();
            for ch in text.chars() {
                let s = ch.to_string();
                if !seen.contains(&s) {
                    seen.push(s);
                }
            }
            if seen.is_empty() {
                seen.push("a".to_string());
            }
            seen
        };

        let det_640 = ModelHandle::with_backend(
            BlockDetBackend {
                blocks: blocks.clone(),
            },
            "det-640",
            4,
        );
        let det_960 = ModelHandle::with_backend(BlockDetBackend { blocks }, "det-960", 4);

        let variants = REC_RATIO_BUCKETS
            .iter()
            .map(|&ratio| {
                (
                    ratio,
                    ModelHandle::with_backend(
                        FixedTextBackend::for_text(text, &tokens, peak),
                        "rec",
                        8,
                    ),
                )
            })
            .collect();

        let recognizer =
            TextRecognizer::new(variants, CtcDecoder::from_tokens(tokens)).expect("all buckets");

        Arc::new(PipelineComponents {
            detector: TextDetector::new(det_640, det_960),
            recognizer,
            doc_orientation: None,
            rectifier: None,
            textline_orientation: None,
        })
    }
}
