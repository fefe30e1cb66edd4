//! Utility functions for the OCR pipeline.

pub mod transform;
pub mod visualization;

pub use transform::get_rotate_crop_image;
pub use visualization::draw_ocr_results;

/// Initializes the tracing subscriber with environment filter and formatting
/// layer. Called once at application start.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
