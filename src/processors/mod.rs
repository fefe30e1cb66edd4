//! Image processing building blocks for the OCR pipeline.

pub mod ctc;
pub mod db_postprocess;
pub mod geometry;
pub mod normalization;
pub mod resize;

pub use ctc::CtcDecoder;
pub use db_postprocess::{DbPostProcess, DetectedBox, MAX_CANDIDATES};
pub use geometry::{quad_bounding_height, quad_center, Point, Polygon, Quad, RotatedRect};
pub use normalization::Normalizer;
pub use resize::{letterbox_resize, resize_for_recognition, LetterboxResult};
