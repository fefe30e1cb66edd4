//! Axon OCR - an accelerated multi-stage OCR pipeline.
//!
//! The crate turns images (and rasterized PDF pages) into localized,
//! recognized text with confidence scores by chaining specialized models:
//! page orientation, document rectification, text detection, text-line
//! orientation and text recognition, all executed through a pipelined
//! inference runtime.
//!
//! Its centerpiece is the asynchronous pipeline scheduler in
//! [`pipeline::scheduler`], which overlaps CPU pre/post-processing with
//! accelerator inference across many in-flight tasks while preserving each
//! task's identity through the crop fan-out/fan-in of recognition.
//!
//! # Modules
//!
//! * [`core`] - errors, tensor aliases and the inference client
//! * [`processors`] - image-level operations: resize, normalize, detection
//!   post-processing, CTC decoding
//! * [`predictor`] - model-backed stages
//! * [`pipeline`] - the synchronous driver and the asynchronous scheduler
//! * [`utils`] - perspective transform, visualization, logging setup

pub mod core;
pub mod pipeline;
pub mod predictor;
pub mod processors;
pub mod utils;

/// Commonly used types, importable with a single `use` statement.
pub mod prelude {
    pub use crate::core::{
        InferJob, ModelHandle, OcrError, OcrResult, OrtBackend, OrtSessionConfig, SessionBackend,
        Tensor2D, Tensor3D, Tensor4D,
    };
    pub use crate::pipeline::{
        AsyncScheduler, OcrOutput, OcrPipeline, PipelineComponents, PipelineStats, PushError,
        SchedulerConfig, StageConcurrency, TaskConfig, TaskResult, TextEntry,
    };
    pub use crate::predictor::{
        DetectionParams, DocOrientationClassifier, DocRectifier, TextDetector, TextLineClassifier,
        TextRecognizer, REC_RATIO_BUCKETS,
    };
    pub use crate::processors::{CtcDecoder, DbPostProcess, Normalizer, Point, Quad};
    pub use crate::utils::{draw_ocr_results, get_rotate_crop_image};
}
