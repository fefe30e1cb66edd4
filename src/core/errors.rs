//! Error types for the OCR pipeline.
//!
//! Every fallible operation in the crate returns [`OcrResult`]. Stage workers
//! in the asynchronous scheduler convert these errors into failed task
//! results instead of propagating them across the stage boundary.

use thiserror::Error;

/// The stage of processing an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Tensor construction or reshaping.
    TensorOperation,
    /// Per-channel normalization.
    Normalization,
    /// Image resizing or padding.
    Resize,
    /// Detection/recognition post-processing.
    PostProcessing,
    /// Generic processing.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Resize => write!(f, "resize"),
            ProcessingStage::PostProcessing => write!(f, "post-processing"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Errors that can occur in the OCR pipeline.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Error while decoding or loading an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Error during a CPU processing step.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
    },

    /// Error raised by a model during inference.
    #[error("inference on model '{model}': {context}")]
    Inference {
        /// Name of the model that failed.
        model: String,
        /// Additional context about the failure.
        context: String,
    },

    /// The inference worker for a model is gone; its job queue is closed.
    #[error("inference engine for model '{model}' is shut down")]
    EngineShutdown {
        /// Name of the model whose worker exited.
        model: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from ndarray shape operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// I/O error, typically while reading a dictionary or model file.
    #[error("io: {context}")]
    Io {
        /// What was being read or written.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl OcrError {
    /// Creates a processing error for the given stage with context.
    pub fn processing(kind: ProcessingStage, context: impl Into<String>) -> Self {
        OcrError::Processing {
            kind,
            context: context.into(),
        }
    }

    /// Creates an inference error attributed to a named model.
    pub fn inference(model: impl Into<String>, context: impl Into<String>) -> Self {
        OcrError::Inference {
            model: model.into(),
            context: context.into(),
        }
    }

    /// Creates an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        OcrError::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        OcrError::ConfigError {
            message: message.into(),
        }
    }

    /// Wraps an I/O error with context about the file being accessed.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        OcrError::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<image::ImageError> for OcrError {
    fn from(err: image::ImageError) -> Self {
        OcrError::ImageLoad(err)
    }
}

/// Convenient result alias for OCR operations.
pub type OcrResult<T> = Result<T, OcrError>;
