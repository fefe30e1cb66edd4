//! Fundamental components of the OCR pipeline.
//!
//! This module holds the error taxonomy, tensor aliases, inference client and
//! session configuration shared by every stage of the pipeline.

pub mod config;
pub mod errors;
pub mod inference;

pub use config::OrtSessionConfig;
pub use errors::{OcrError, OcrResult, ProcessingStage};
pub use inference::{InferJob, ModelHandle, OrtBackend, SessionBackend};

/// A 2D tensor of f32 values (batch, classes).
pub type Tensor2D = ndarray::Array2<f32>;
/// A 3D tensor of f32 values (batch, sequence, classes).
pub type Tensor3D = ndarray::Array3<f32>;
/// A 4D tensor of f32 values (batch, channels, height, width).
pub type Tensor4D = ndarray::Array4<f32>;
