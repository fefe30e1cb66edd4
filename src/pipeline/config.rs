//! Pipeline and scheduler configuration.

use serde::{Deserialize, Serialize};

/// Per-task processing options, frozen at submission time. The scheduler
/// treats a task's config as read-only for the task's whole lifetime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Run whole-page orientation classification before detection.
    pub use_doc_orientation: bool,
    /// Run flow-field document rectification before detection.
    pub use_unwarping: bool,
    /// Run per-crop 0°/180° classification before recognition.
    pub use_textline_orientation: bool,
    /// Detection map binarization threshold.
    pub det_thresh: f32,
    /// Detection box mean-probability threshold.
    pub det_box_thresh: f32,
    /// Detection unclip expansion ratio.
    pub det_unclip_ratio: f32,
    /// Minimum recognition confidence for an entry to be kept.
    pub rec_score_thresh: f32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            use_doc_orientation: false,
            use_unwarping: false,
            use_textline_orientation: false,
            det_thresh: 0.3,
            det_box_thresh: 0.6,
            det_unclip_ratio: 1.5,
            rec_score_thresh: 0.0,
        }
    }
}

/// Worker pool sizes per scheduler stage.
///
/// Accelerator-bound stages default to a single worker because the engine
/// behind them is already pipelined; recognition gets a pool so CPU
/// preprocessing of one crop overlaps accelerator time of another.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StageConcurrency {
    /// Workers for the preprocessing stage (orientation + rectification).
    pub pre_workers: usize,
    /// Workers for the detection stage.
    pub det_workers: usize,
    /// Workers for the recognition stage.
    pub rec_workers: usize,
}

impl Default for StageConcurrency {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            pre_workers: 1,
            det_workers: 1,
            rec_workers: cpus.saturating_sub(2).max(2),
        }
    }
}

impl StageConcurrency {
    /// Clamps every pool to at least one worker.
    pub fn sanitized(self) -> Self {
        Self {
            pre_workers: self.pre_workers.max(1),
            det_workers: self.det_workers.max(1),
            rec_workers: self.rec_workers.max(1),
        }
    }
}

/// Channel sizing and concurrency for the asynchronous scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Stage worker pool sizes.
    pub concurrency: StageConcurrency,
    /// Admission bound: capacity of the intake queue.
    pub intake_capacity: usize,
    /// Capacity of the preprocessing → detection channel.
    pub stage_capacity: usize,
    /// Capacity of the crop fan-out channel into recognition.
    pub crop_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: StageConcurrency::default(),
            intake_capacity: 32,
            stage_capacity: 8,
            crop_capacity: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_config_defaults_match_api_defaults() {
        let cfg = TaskConfig::default();
        assert!(!cfg.use_doc_orientation);
        assert!(!cfg.use_unwarping);
        assert!(!cfg.use_textline_orientation);
        assert_eq!(cfg.det_thresh, 0.3);
        assert_eq!(cfg.det_box_thresh, 0.6);
        assert_eq!(cfg.det_unclip_ratio, 1.5);
        assert_eq!(cfg.rec_score_thresh, 0.0);
    }

    #[test]
    fn sanitized_concurrency_never_drops_to_zero() {
        let c = StageConcurrency {
            pre_workers: 0,
            det_workers: 0,
            rec_workers: 0,
        }
        .sanitized();
        assert_eq!((c.pre_workers, c.det_workers, c.rec_workers), (1, 1, 1));
    }
}
