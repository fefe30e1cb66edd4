//! Model-backed stages of the OCR pipeline.

pub mod db_detector;
pub mod doc_orientation;
pub mod rectifier;
pub mod recognizer;
pub mod textline_orientation;

pub use db_detector::{sort_boxes_reading_order, DetectionParams, TextDetector, DET_SIZE_THRESHOLD};
pub use doc_orientation::{DocOrientationClassifier, DEFAULT_ORIENTATION_THRESHOLD};
pub use rectifier::DocRectifier;
pub use recognizer::{select_ratio_bucket, TextRecognizer, REC_INPUT_HEIGHT, REC_RATIO_BUCKETS};
pub use textline_orientation::TextLineClassifier;
