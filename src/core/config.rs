//! Session configuration for the inference runtime.

use serde::{Deserialize, Serialize};

/// Threading configuration applied when building an ONNX Runtime session.
///
/// All fields default to `None`, which keeps the runtime's own defaults. The
/// accelerator-bound stages of the pipeline run one session per model behind
/// a dedicated worker thread, so intra-op parallelism is usually the only
/// knob worth turning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrtSessionConfig {
    /// Number of threads used to parallelize execution within nodes.
    #[serde(default)]
    pub intra_threads: Option<usize>,

    /// Number of threads used to parallelize execution across nodes.
    #[serde(default)]
    pub inter_threads: Option<usize>,

    /// Enable the runtime's parallel execution mode.
    #[serde(default)]
    pub parallel_execution: Option<bool>,
}

impl OrtSessionConfig {
    /// Creates a configuration with runtime defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the intra-op thread count.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// Sets the inter-op thread count.
    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    /// Sets the parallel execution mode.
    pub fn with_parallel_execution(mut self, enabled: bool) -> Self {
        self.parallel_execution = Some(enabled);
        self
    }
}
