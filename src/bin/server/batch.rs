//! Batch benchmark mode: run every image in a directory through the
//! synchronous pipeline N times, save JSON results and visualizations, and
//! report per-image and aggregate timings.

use crate::config::{list_image_files, load_components, OcrConfig};
use axon_ocr::pipeline::{OcrOutput, OcrPipeline, TaskConfig};
use axon_ocr::utils::draw_ocr_results;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs the batch benchmark. Returns the process exit code: non-zero when
/// initialization fails or no images are found.
pub fn run_batch(
    config: &OcrConfig,
    images_dir: &Path,
    output_dir: &Path,
    runs_per_image: usize,
    use_unwarping: bool,
) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
    info!("Axon OCR - batch benchmark");
    info!(images = %images_dir.display(), output = %output_dir.display(), runs_per_image);

    let components = match load_components(config) {
        Ok(components) => Arc::new(components),
        Err(e) => {
            error!(error = %e, "failed to initialize pipeline");
            return Ok(1);
        }
    };
    let pipeline = OcrPipeline::new(components);

    let image_files = list_image_files(images_dir);
    if image_files.is_empty() {
        error!(dir = %images_dir.display(), "no images found");
        return Ok(1);
    }
    info!(count = image_files.len(), "images loaded");

    std::fs::create_dir_all(output_dir)?;
    let vis_dir = output_dir.join("vis");
    std::fs::create_dir_all(&vis_dir)?;

    let task_config = TaskConfig {
        use_unwarping,
        ..TaskConfig::default()
    };

    let mut total_ms = 0.0;
    let mut total_boxes = 0usize;
    let mut processed = 0usize;

    for path in &image_files {
        let image = match image::open(path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable image");
                continue;
            }
        };

        let mut times = Vec::with_capacity(runs_per_image);
        let mut last: Option<OcrOutput> = None;
        for _ in 0..runs_per_image {
            match pipeline.process(&image, &task_config) {
                Ok(output) => {
                    times.push(output.stats.total_ms);
                    last = Some(output);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "run failed");
                }
            }
        }

        let Some(output) = last else {
            warn!(path = %path.display(), "all runs failed");
            continue;
        };
        if times.len() != runs_per_image {
            warn!(
                path = %path.display(),
                ok = times.len(),
                expected = runs_per_image,
                "incomplete runs"
            );
        }

        let avg_ms = times.iter().sum::<f64>() / times.len() as f64;
        total_ms += avg_ms;
        total_boxes += output.entries.len();
        processed += 1;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");

        let report = json!({
            "image": path.display().to_string(),
            "runs": runs_per_image,
            "avg_ms": avg_ms,
            "results": output.entries.iter().map(|e| json!({
                "index": e.index,
                "text": e.text,
                "confidence": e.confidence,
                "box": e.quad.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
            "total_count": output.entries.len(),
        });
        std::fs::write(
            output_dir.join(format!("{stem}.json")),
            serde_json::to_string_pretty(&report)?,
        )?;

        let vis = draw_ocr_results(&output.processed_image, &output.entries);
        if let Err(e) = vis.save(vis_dir.join(format!("{stem}.png"))) {
            warn!(error = %e, "failed to save visualization");
        }

        info!(
            image = %path.display(),
            avg_ms,
            boxes = output.entries.len(),
            "image done"
        );
    }

    if processed == 0 {
        error!("no images processed successfully");
        return Ok(1);
    }

    info!("========== batch summary ==========");
    info!(
        images = processed,
        total_boxes,
        avg_ms_per_image = total_ms / processed as f64,
    );
    Ok(0)
}
