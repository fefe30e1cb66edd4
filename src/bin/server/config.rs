//! Server configuration and model loading.

use axon_ocr::core::{ModelHandle, OcrError, OcrResult, OrtSessionConfig};
use axon_ocr::pipeline::PipelineComponents;
use axon_ocr::predictor::{
    DocOrientationClassifier, DocRectifier, TextDetector, TextLineClassifier, TextRecognizer,
    REC_RATIO_BUCKETS,
};
use axon_ocr::processors::CtcDecoder;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which model family to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelFamily {
    /// Full-size models.
    Server,
    /// Smaller, faster models.
    Mobile,
}

impl ModelFamily {
    fn dir_name(&self) -> &'static str {
        match self {
            ModelFamily::Server => "server",
            ModelFamily::Mobile => "mobile",
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Settings shared by the serve and batch subcommands.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Root directory holding the model families and the dictionary.
    pub model_dir: PathBuf,
    /// Model family subdirectory.
    pub family: ModelFamily,
    /// Character dictionary path; defaults to `<model_dir>/ppocrv5_dict.txt`.
    pub dict_path: Option<PathBuf>,
    /// Inference session threading.
    pub ort: OrtSessionConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Model settings.
    pub ocr: OcrConfig,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Visualization output directory served under `/static/vis`.
    pub vis_dir: PathBuf,
    /// Disable SSL certificate verification for URL downloads.
    pub no_verify_ssl: bool,
}

/// Loads every pipeline stage from the configured model directory.
///
/// Layout: `<model_dir>/<family>/` holds `det_640.onnx`, `det_960.onnx`,
/// `rec_ratio_<r>.onnx` for each ratio bucket, and optionally
/// `doc_ori.onnx`, `uvdoc.onnx` and `textline_ori.onnx`. Optional stages
/// that are absent are skipped with a warning; requests asking for them run
/// without.
pub fn load_components(config: &OcrConfig) -> OcrResult<PipelineComponents> {
    let family_dir = config.model_dir.join(config.family.dir_name());
    if !family_dir.is_dir() {
        return Err(OcrError::config(format!(
            "model directory {} does not exist",
            family_dir.display()
        )));
    }

    let load = |file: &str, name: &str| -> OcrResult<ModelHandle> {
        ModelHandle::load(&family_dir.join(file), name, &config.ort)
    };

    let detector = TextDetector::new(
        load("det_640.onnx", "det-640")?,
        load("det_960.onnx", "det-960")?,
    );

    let dict_path = config
        .dict_path
        .clone()
        .unwrap_or_else(|| config.model_dir.join("ppocrv5_dict.txt"));
    let decoder = CtcDecoder::from_dict_file(&dict_path)?;

    let mut variants = Vec::with_capacity(REC_RATIO_BUCKETS.len());
    for ratio in REC_RATIO_BUCKETS {
        variants.push((
            ratio,
            load(&format!("rec_ratio_{ratio}.onnx"), &format!("rec-{ratio}"))?,
        ));
    }
    let recognizer = TextRecognizer::new(variants, decoder)?;

    let optional = |file: &str, name: &str| -> Option<ModelHandle> {
        let path = family_dir.join(file);
        if !path.is_file() {
            warn!(model = name, path = %path.display(), "optional model not found; stage disabled");
            return None;
        }
        match ModelHandle::load(&path, name, &config.ort) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(model = name, error = %e, "optional model failed to load; stage disabled");
                None
            }
        }
    };

    let components = PipelineComponents {
        detector,
        recognizer,
        doc_orientation: optional("doc_ori.onnx", "doc-ori").map(DocOrientationClassifier::new),
        rectifier: optional("uvdoc.onnx", "uvdoc").map(DocRectifier::new),
        textline_orientation: optional("textline_ori.onnx", "textline-ori")
            .map(TextLineClassifier::new),
    };

    info!(
        family = %config.family,
        dict = %dict_path.display(),
        doc_orientation = components.doc_orientation.is_some(),
        rectifier = components.rectifier.is_some(),
        textline = components.textline_orientation.is_some(),
        "pipeline components loaded"
    );
    Ok(components)
}

/// Collects image files (jpg/jpeg/png/bmp) directly under a directory,
/// sorted by path.
pub fn list_image_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_file()
                        && path
                            .extension()
                            .and_then(|ext| ext.to_str())
                            .map(|ext| {
                                matches!(
                                    ext.to_ascii_lowercase().as_str(),
                                    "jpg" | "jpeg" | "png" | "bmp"
                                )
                            })
                            .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}
