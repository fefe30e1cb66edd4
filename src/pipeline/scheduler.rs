//! Asynchronous multi-stage scheduler.
//!
//! Amortizes accelerator latency across tasks and across the crops of one
//! task while preserving per-task identity:
//!
//! ```text
//! [intake] → S_pre → S_det → [fan-out crops] → S_rec → [fan-in] → [publish]
//! ```
//!
//! Stages are pools of long-lived worker threads connected by bounded
//! channels; a full downstream channel blocks the upstream worker, and the
//! intake capacity is the admission bound. Detection fans each task out into
//! its text-line crops, recognition processes crops from all tasks
//! interleaved, and a single fan-in worker reassembles completions under the
//! parent task's identity. The fan-in worker is the only owner of the
//! pending bookkeeping, so no lock is shared across stages; registration
//! events are enqueued before any crop of the same task can complete, which
//! makes the ordering safe by construction.
//!
//! Stage errors are task-scoped: the failing task publishes a failed result
//! and the worker moves on. `stop()` drains topologically; every task that
//! entered the pipeline publishes exactly one result before the result
//! channel closes.

use crate::pipeline::config::{SchedulerConfig, TaskConfig};
use crate::pipeline::ocr::{keep_entry, preprocess_page, recognize_crop, PipelineComponents};
use crate::pipeline::result::{sort_reading_order, TaskFailure, TaskResult, TextEntry};
use crate::predictor::DetectionParams;
use crate::processors::geometry::Quad;
use crate::utils::get_rotate_crop_image;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use image::RgbImage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Why a push was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The intake queue is at capacity; the caller may retry later.
    Full,
    /// The scheduler has been stopped.
    Closed,
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushError::Full => write!(f, "scheduler intake queue is full"),
            PushError::Closed => write!(f, "scheduler is stopped"),
        }
    }
}

impl std::error::Error for PushError {}

/// Monotonic counters across the scheduler's lifetime.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    submitted: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
}

impl SchedulerStats {
    /// Tasks admitted through the intake.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Results published, successful and failed together.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Failed results among the published ones.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// A task travelling from intake into preprocessing.
struct PreTask {
    id: u64,
    image: RgbImage,
    config: TaskConfig,
}

/// A task after page preprocessing, heading into detection.
struct DetTask {
    id: u64,
    image: RgbImage,
    config: TaskConfig,
}

/// One text-line crop of a parent task, heading into recognition.
struct CropTask {
    parent_id: u64,
    crop_index: u32,
    image: RgbImage,
    quad: Quad,
    config: TaskConfig,
}

/// Events consumed by the fan-in worker, the sole owner of pending state.
enum FanInEvent {
    /// A task fanned out into `expected` crops. Enqueued strictly before any
    /// crop of the task enters recognition; `expected == 0` publishes an
    /// empty result immediately.
    Register {
        id: u64,
        image: RgbImage,
        expected: usize,
    },
    /// One crop finished: a kept entry, a filtered-out `None`, or a
    /// crop-level error message.
    CropDone {
        parent_id: u64,
        crop_index: u32,
        outcome: Result<Option<TextEntry>, String>,
    },
    /// A whole-task stage failure before fan-out.
    Failed {
        id: u64,
        image: RgbImage,
        stage: &'static str,
        message: String,
    },
}

/// Fan-in bookkeeping for one task between fan-out and publication.
struct PendingTask {
    remaining: usize,
    slots: Vec<Option<TextEntry>>,
    image: RgbImage,
    failure: Option<String>,
}

/// The asynchronous pipeline scheduler.
///
/// One instance serves many concurrent submitters; results are demultiplexed
/// by task id and arrive in no particular order across tasks.
pub struct AsyncScheduler {
    intake_tx: Mutex<Option<Sender<PreTask>>>,
    result_rx: Receiver<TaskResult>,
    pre_handles: Mutex<Vec<JoinHandle<()>>>,
    det_handles: Mutex<Vec<JoinHandle<()>>>,
    rec_handles: Mutex<Vec<JoinHandle<()>>>,
    fanin_handle: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<SchedulerStats>,
}

impl AsyncScheduler {
    /// Starts the stage worker pools over shared pipeline components.
    pub fn start(components: Arc<PipelineComponents>, config: SchedulerConfig) -> Self {
        let concurrency = config.concurrency.sanitized();

        let (intake_tx, intake_rx) = bounded::<PreTask>(config.intake_capacity.max(1));
        let (det_tx, det_rx) = bounded::<DetTask>(config.stage_capacity.max(1));
        let (rec_tx, rec_rx) = bounded::<CropTask>(config.crop_capacity.max(1));
        let (fanin_tx, fanin_rx) = bounded::<FanInEvent>(config.crop_capacity.max(1));
        // The result queue is not a backpressure point: stalling fan-in on a
        // slow consumer would stall every stage behind it.
        let (result_tx, result_rx) = unbounded::<TaskResult>();

        let stats = Arc::new(SchedulerStats::default());

        let mut pre_handles = Vec::with_capacity(concurrency.pre_workers);
        for worker in 0..concurrency.pre_workers {
            let rx = intake_rx.clone();
            let tx = det_tx.clone();
            let fanin = fanin_tx.clone();
            let components = components.clone();
            pre_handles.push(spawn_worker(format!("ocr-pre-{worker}"), move || {
                pre_worker(rx, tx, fanin, components)
            }));
        }
        drop(intake_rx);
        drop(det_tx);

        let mut det_handles = Vec::with_capacity(concurrency.det_workers);
        for worker in 0..concurrency.det_workers {
            let rx = det_rx.clone();
            let crops = rec_tx.clone();
            let fanin = fanin_tx.clone();
            let components = components.clone();
            det_handles.push(spawn_worker(format!("ocr-det-{worker}"), move || {
                det_worker(rx, crops, fanin, components)
            }));
        }
        drop(det_rx);
        drop(rec_tx);

        let mut rec_handles = Vec::with_capacity(concurrency.rec_workers);
        for worker in 0..concurrency.rec_workers {
            let rx = rec_rx.clone();
            let fanin = fanin_tx.clone();
            let components = components.clone();
            rec_handles.push(spawn_worker(format!("ocr-rec-{worker}"), move || {
                rec_worker(rx, fanin, components)
            }));
        }
        drop(rec_rx);
        drop(fanin_tx);

        let fanin_stats = stats.clone();
        let fanin_handle = spawn_worker("ocr-fanin".to_string(), move || {
            fanin_worker(fanin_rx, result_tx, fanin_stats)
        });

        info!(
            pre = concurrency.pre_workers,
            det = concurrency.det_workers,
            rec = concurrency.rec_workers,
            intake = config.intake_capacity,
            "async scheduler started"
        );

        Self {
            intake_tx: Mutex::new(Some(intake_tx)),
            result_rx,
            pre_handles: Mutex::new(pre_handles),
            det_handles: Mutex::new(det_handles),
            rec_handles: Mutex::new(rec_handles),
            fanin_handle: Mutex::new(Some(fanin_handle)),
            stats,
        }
    }

    fn intake(&self) -> Option<Sender<PreTask>> {
        self.intake_tx.lock().ok().and_then(|guard| guard.clone())
    }

    /// Non-blocking push. Fails with [`PushError::Full`] when the intake is
    /// at capacity.
    pub fn try_push(&self, image: RgbImage, id: u64, config: TaskConfig) -> Result<(), PushError> {
        let tx = self.intake().ok_or(PushError::Closed)?;
        match tx.try_send(PreTask { id, image, config }) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(PushError::Full),
            Err(TrySendError::Disconnected(_)) => Err(PushError::Closed),
        }
    }

    /// Blocking push; waits until the intake admits the task.
    pub fn push_blocking(
        &self,
        image: RgbImage,
        id: u64,
        config: TaskConfig,
    ) -> Result<(), PushError> {
        let tx = self.intake().ok_or(PushError::Closed)?;
        tx.send(PreTask { id, image, config })
            .map_err(|_| PushError::Closed)?;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Push with an admission deadline; the server's submission path.
    pub fn push_timeout(
        &self,
        image: RgbImage,
        id: u64,
        config: TaskConfig,
        timeout: Duration,
    ) -> Result<(), PushError> {
        let tx = self.intake().ok_or(PushError::Closed)?;
        match tx.send_timeout(PreTask { id, image, config }, timeout) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(crossbeam_channel::SendTimeoutError::Timeout(_)) => Err(PushError::Full),
            Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => Err(PushError::Closed),
        }
    }

    /// Non-blocking result poll. Results arrive in completion order, not
    /// submission order; consumers demultiplex by id.
    pub fn try_get_result(&self) -> Option<TaskResult> {
        self.result_rx.try_recv().ok()
    }

    /// Result poll with a deadline. `None` on timeout or after the channel
    /// closed post-shutdown.
    pub fn get_result_timeout(&self, timeout: Duration) -> Option<TaskResult> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Lifetime counters.
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// True once `stop` has closed the intake.
    pub fn is_stopped(&self) -> bool {
        self.intake_tx
            .lock()
            .map(|guard| guard.is_none())
            .unwrap_or(true)
    }

    /// Drains and stops the pipeline in topological order: close intake,
    /// wait for preprocessing, then detection, then recognition, then the
    /// fan-in worker. Tasks in flight run to completion; their results stay
    /// readable on the result channel until consumed.
    pub fn stop(&self) {
        let intake = self.intake_tx.lock().ok().and_then(|mut guard| guard.take());
        if intake.is_none() {
            return;
        }
        drop(intake);

        for handles in [&self.pre_handles, &self.det_handles, &self.rec_handles] {
            if let Ok(mut guard) = handles.lock() {
                for handle in guard.drain(..) {
                    if handle.join().is_err() {
                        error!("scheduler stage worker panicked");
                    }
                }
            }
        }
        if let Ok(mut guard) = self.fanin_handle.lock() {
            if let Some(handle) = guard.take() {
                if handle.join().is_err() {
                    error!("scheduler fan-in worker panicked");
                }
            }
        }

        info!(
            submitted = self.stats.submitted(),
            published = self.stats.published(),
            failed = self.stats.failed(),
            "async scheduler drained"
        );
    }
}

impl Drop for AsyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_worker<F: FnOnce() + Send + 'static>(name: String, body: F) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .unwrap_or_else(|e| panic!("failed to spawn scheduler worker {name}: {e}"))
}

/// Preprocessing worker: orientation and rectification on the whole page.
fn pre_worker(
    rx: Receiver<PreTask>,
    det_tx: Sender<DetTask>,
    fanin_tx: Sender<FanInEvent>,
    components: Arc<PipelineComponents>,
) {
    for task in rx.iter() {
        let PreTask { id, image, config } = task;
        match preprocess_page(&components, image.clone(), &config) {
            Ok(processed) => {
                if det_tx
                    .send(DetTask {
                        id,
                        image: processed,
                        config,
                    })
                    .is_err()
                {
                    warn!(task_id = id, "detection stage gone; dropping out of pre worker");
                    return;
                }
            }
            Err(e) => {
                debug!(task_id = id, error = %e, "preprocessing failed");
                if fanin_tx
                    .send(FanInEvent::Failed {
                        id,
                        image,
                        stage: "preprocess",
                        message: e.to_string(),
                    })
                    .is_err()
                {
                    return;
                }
            }
        }
    }
}

/// Detection worker: detects regions, crops them, and fans the task out.
///
/// The `Register` event is sent before any crop so the fan-in worker always
/// sees the expected count before the first completion.
fn det_worker(
    rx: Receiver<DetTask>,
    rec_tx: Sender<CropTask>,
    fanin_tx: Sender<FanInEvent>,
    components: Arc<PipelineComponents>,
) {
    for task in rx.iter() {
        let DetTask { id, image, config } = task;
        let params = DetectionParams {
            thresh: config.det_thresh,
            box_thresh: config.det_box_thresh,
            unclip_ratio: config.det_unclip_ratio,
        };

        let boxes = match components.detector.detect(&image, &params) {
            Ok(boxes) => boxes,
            Err(e) => {
                debug!(task_id = id, error = %e, "detection failed");
                if fanin_tx
                    .send(FanInEvent::Failed {
                        id,
                        image,
                        stage: "detection",
                        message: e.to_string(),
                    })
                    .is_err()
                {
                    return;
                }
                continue;
            }
        };

        // Degenerate quads are dropped here, so the registered count is the
        // number of crops that will actually reach recognition.
        let mut crops = Vec::with_capacity(boxes.len());
        for region in boxes {
            match get_rotate_crop_image(&image, &region.quad) {
                Ok(crop) => crops.push((region.quad, crop)),
                Err(e) => debug!(task_id = id, error = %e, "skipping degenerate crop"),
            }
        }

        if fanin_tx
            .send(FanInEvent::Register {
                id,
                image,
                expected: crops.len(),
            })
            .is_err()
        {
            return;
        }

        for (crop_index, (quad, crop)) in crops.into_iter().enumerate() {
            if rec_tx
                .send(CropTask {
                    parent_id: id,
                    crop_index: crop_index as u32,
                    image: crop,
                    quad,
                    config,
                })
                .is_err()
            {
                warn!(task_id = id, "recognition stage gone; dropping out of det worker");
                return;
            }
        }
    }
}

/// Recognition worker: line orientation plus CTC recognition per crop.
fn rec_worker(
    rx: Receiver<CropTask>,
    fanin_tx: Sender<FanInEvent>,
    components: Arc<PipelineComponents>,
) {
    for crop in rx.iter() {
        let CropTask {
            parent_id,
            crop_index,
            image,
            quad,
            config,
        } = crop;

        let outcome = match recognize_crop(&components, image, &config) {
            Ok((text, confidence, _flipped)) => {
                if keep_entry(&text, confidence, &config) {
                    Ok(Some(TextEntry {
                        quad,
                        text,
                        confidence,
                        index: 0,
                    }))
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(e.to_string()),
        };

        if fanin_tx
            .send(FanInEvent::CropDone {
                parent_id,
                crop_index,
                outcome,
            })
            .is_err()
        {
            return;
        }
    }
}

/// Fan-in worker: the only owner of the pending map. Gathers crop
/// completions, restores crop order, applies the reading-order sort and
/// publishes exactly one result per task.
fn fanin_worker(
    rx: Receiver<FanInEvent>,
    result_tx: Sender<TaskResult>,
    stats: Arc<SchedulerStats>,
) {
    let mut pending: HashMap<u64, PendingTask> = HashMap::new();

    let publish = |result: TaskResult, stats: &SchedulerStats| {
        if result.failure.is_some() {
            stats.failed.fetch_add(1, Ordering::Relaxed);
        }
        stats.published.fetch_add(1, Ordering::Relaxed);
        if result_tx.send(result).is_err() {
            debug!("result consumer gone");
        }
    };

    for event in rx.iter() {
        match event {
            FanInEvent::Register {
                id,
                image,
                expected,
            } => {
                if expected == 0 {
                    publish(
                        TaskResult {
                            id,
                            entries: Vec::new(),
                            processed_image: image,
                            failure: None,
                        },
                        &stats,
                    );
                    continue;
                }
                let previous = pending.insert(
                    id,
                    PendingTask {
                        remaining: expected,
                        slots: (0..expected).map(|_| None).collect(),
                        image,
                        failure: None,
                    },
                );
                if previous.is_some() {
                    // Ids are allocated monotonically by the coordinator, so
                    // this indicates a caller bug rather than a race.
                    error!(task_id = id, "duplicate task id registered; earlier task dropped");
                }
            }
            FanInEvent::CropDone {
                parent_id,
                crop_index,
                outcome,
            } => {
                let Some(task) = pending.get_mut(&parent_id) else {
                    error!(task_id = parent_id, "completion for unknown task");
                    continue;
                };

                match outcome {
                    Ok(Some(entry)) => {
                        if let Some(slot) = task.slots.get_mut(crop_index as usize) {
                            *slot = Some(entry);
                        }
                    }
                    Ok(None) => {}
                    Err(message) => {
                        debug!(task_id = parent_id, crop_index, "crop failed: {message}");
                        task.failure.get_or_insert(message);
                    }
                }

                task.remaining -= 1;
                if task.remaining > 0 {
                    continue;
                }

                let Some(task) = pending.remove(&parent_id) else {
                    continue;
                };
                let result = if let Some(message) = task.failure {
                    TaskResult {
                        id: parent_id,
                        entries: Vec::new(),
                        processed_image: task.image,
                        failure: Some(TaskFailure {
                            stage: "recognition",
                            message,
                        }),
                    }
                } else {
                    let mut entries: Vec<TextEntry> =
                        task.slots.into_iter().flatten().collect();
                    sort_reading_order(&mut entries);
                    TaskResult {
                        id: parent_id,
                        entries,
                        processed_image: task.image,
                        failure: None,
                    }
                };
                publish(result, &stats);
            }
            FanInEvent::Failed {
                id,
                image,
                stage,
                message,
            } => {
                publish(
                    TaskResult {
                        id,
                        entries: Vec::new(),
                        processed_image: image,
                        failure: Some(TaskFailure { stage, message }),
                    },
                    &stats,
                );
            }
        }
    }

    // Drain guarantee: upstream stages have exited, so everything pending
    // has received all its completions. Anything left indicates a bug.
    if !pending.is_empty() {
        error!(count = pending.len(), "tasks still pending at fan-in shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::test_components;
    use std::collections::HashSet;

    fn drain_results(scheduler: &AsyncScheduler, count: usize) -> Vec<TaskResult> {
        let mut results = Vec::with_capacity(count);
        while results.len() < count {
            match scheduler.get_result_timeout(Duration::from_secs(10)) {
                Some(result) => results.push(result),
                None => panic!("timed out with {}/{} results", results.len(), count),
            }
        }
        results
    }

    #[test]
    fn blank_task_publishes_empty_result() {
        let scheduler = AsyncScheduler::start(
            test_components(vec![], "ab", 0.9),
            SchedulerConfig::default(),
        );
        scheduler
            .push_blocking(RgbImage::new(640, 480), 7, TaskConfig::default())
            .unwrap();
        let result = scheduler.get_result_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(result.id, 7);
        assert!(result.is_ok());
        assert!(result.entries.is_empty());
    }

    #[test]
    fn every_submitted_id_is_published_exactly_once() {
        let scheduler = AsyncScheduler::start(
            test_components(vec![(0.3, 0.5, 0.2, 0.8)], "ok", 0.9),
            SchedulerConfig::default(),
        );
        for id in 0..40u64 {
            scheduler
                .push_blocking(RgbImage::new(320, 240), id, TaskConfig::default())
                .unwrap();
        }
        let results = drain_results(&scheduler, 40);
        let ids: HashSet<u64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 40);
        for result in &results {
            assert!(result.is_ok());
            assert_eq!(result.entries.len(), 1);
            assert_eq!(result.entries[0].text, "ok");
        }
    }

    #[test]
    fn score_threshold_filtering_still_completes_the_task() {
        let scheduler = AsyncScheduler::start(
            test_components(vec![(0.3, 0.5, 0.2, 0.8)], "ok", 0.9),
            SchedulerConfig::default(),
        );
        let config = TaskConfig {
            rec_score_thresh: 0.99,
            ..TaskConfig::default()
        };
        scheduler
            .push_blocking(RgbImage::new(320, 240), 1, config)
            .unwrap();
        let result = scheduler.get_result_timeout(Duration::from_secs(10)).unwrap();
        assert!(result.is_ok());
        assert!(result.entries.is_empty());
    }

    #[test]
    fn multi_region_task_reassembles_under_one_id() {
        let blocks = vec![
            (0.1, 0.2, 0.1, 0.6),
            (0.4, 0.5, 0.1, 0.6),
            (0.7, 0.8, 0.1, 0.6),
        ];
        let scheduler = AsyncScheduler::start(
            test_components(blocks, "row", 0.9),
            SchedulerConfig::default(),
        );
        scheduler
            .push_blocking(RgbImage::new(480, 480), 11, TaskConfig::default())
            .unwrap();
        let result = scheduler.get_result_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(result.id, 11);
        assert_eq!(result.entries.len(), 3);
        // Reading order: indexes are sequential and rows ordered by y.
        for (i, entry) in result.entries.iter().enumerate() {
            assert_eq!(entry.index, i as u32);
        }
        let y0 = crate::processors::geometry::quad_center(&result.entries[0].quad).y;
        let y2 = crate::processors::geometry::quad_center(&result.entries[2].quad).y;
        assert!(y0 < y2);
    }

    #[test]
    fn stop_drains_all_in_flight_tasks() {
        let scheduler = AsyncScheduler::start(
            test_components(vec![(0.3, 0.5, 0.2, 0.8)], "x", 0.9),
            SchedulerConfig::default(),
        );
        for id in 0..16u64 {
            scheduler
                .push_blocking(RgbImage::new(320, 240), id, TaskConfig::default())
                .unwrap();
        }
        scheduler.stop();
        assert!(scheduler.is_stopped());

        let mut count = 0;
        while scheduler.try_get_result().is_some() {
            count += 1;
        }
        assert_eq!(count, 16);
        assert_eq!(scheduler.stats().submitted(), 16);
        assert_eq!(scheduler.stats().published(), 16);
        assert_eq!(scheduler.stats().failed(), 0);
    }

    #[test]
    fn push_after_stop_is_rejected() {
        let scheduler = AsyncScheduler::start(
            test_components(vec![], "x", 0.9),
            SchedulerConfig::default(),
        );
        scheduler.stop();
        let err = scheduler
            .try_push(RgbImage::new(64, 64), 1, TaskConfig::default())
            .unwrap_err();
        assert_eq!(err, PushError::Closed);
    }

    #[test]
    fn full_intake_reports_full_not_deadlock() {
        // One-slot intake with workers that cannot keep up instantly.
        let config = SchedulerConfig {
            intake_capacity: 1,
            ..SchedulerConfig::default()
        };
        let scheduler =
            AsyncScheduler::start(test_components(vec![], "x", 0.9), config);
        let mut accepted = 0;
        let mut full = 0;
        for id in 0..64u64 {
            match scheduler.try_push(RgbImage::new(640, 480), id, TaskConfig::default()) {
                Ok(()) => accepted += 1,
                Err(PushError::Full) => full += 1,
                Err(PushError::Closed) => panic!("scheduler closed unexpectedly"),
            }
        }
        assert!(accepted >= 1);
        assert_eq!(accepted + full, 64);
        // Every accepted task must still publish.
        let results = drain_results(&scheduler, accepted);
        assert_eq!(results.len(), accepted);
    }

    #[test]
    fn concurrent_submitters_each_get_their_own_results() {
        let scheduler = Arc::new(AsyncScheduler::start(
            test_components(vec![(0.3, 0.5, 0.2, 0.8)], "mine", 0.9),
            SchedulerConfig::default(),
        ));

        const CALLERS: u64 = 8;
        const PER_CALLER: u64 = 6;

        let mut submitters = Vec::new();
        for caller in 0..CALLERS {
            let scheduler = scheduler.clone();
            submitters.push(std::thread::spawn(move || {
                for i in 0..PER_CALLER {
                    let id = caller * 1000 + i;
                    scheduler
                        .push_blocking(RgbImage::new(320, 240), id, TaskConfig::default())
                        .unwrap();
                }
            }));
        }
        for s in submitters {
            s.join().unwrap();
        }

        let results = drain_results(&scheduler, (CALLERS * PER_CALLER) as usize);
        let mut per_caller: HashMap<u64, HashSet<u64>> = HashMap::new();
        for result in &results {
            assert!(result.is_ok());
            per_caller
                .entry(result.id / 1000)
                .or_default()
                .insert(result.id % 1000);
        }
        assert_eq!(per_caller.len(), CALLERS as usize);
        for ids in per_caller.values() {
            assert_eq!(ids.len(), PER_CALLER as usize);
        }
    }
}
