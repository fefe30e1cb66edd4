//! OCR request/response types and validation.

use crate::errors::ApiError;
use crate::pdf::{PdfOptions, DEFAULT_DPI, DEFAULT_MAX_PAGES};
use axon_ocr::pipeline::{TaskConfig, TextEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// File type discriminator: image payload.
pub const FILE_TYPE_IMAGE: i32 = 1;
/// File type discriminator: PDF payload.
pub const FILE_TYPE_PDF: i32 = 0;

/// The `/ocr` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrRequest {
    /// Base64 payload or HTTP(S) URL.
    #[serde(default)]
    pub file: Option<String>,
    /// 1 = image, 0 = PDF.
    #[serde(default = "defaults::file_type")]
    pub file_type: i32,
    /// Run whole-page orientation classification.
    #[serde(default)]
    pub use_doc_orientation_classify: bool,
    /// Run document rectification.
    #[serde(default)]
    pub use_doc_unwarping: bool,
    /// Run per-line orientation classification.
    #[serde(default)]
    pub use_textline_orientation: bool,
    /// Accepted for compatibility; the fixed model variants govern sizing.
    #[serde(default = "defaults::det_limit_side_len")]
    pub text_det_limit_side_len: i64,
    /// Accepted for compatibility; the fixed model variants govern sizing.
    #[serde(default = "defaults::det_limit_type")]
    pub text_det_limit_type: String,
    /// Detection pixel threshold, in [0, 1].
    #[serde(default = "defaults::det_thresh")]
    pub text_det_thresh: f64,
    /// Detection box threshold, in [0, 1].
    #[serde(default = "defaults::det_box_thresh")]
    pub text_det_box_thresh: f64,
    /// Detection unclip ratio, in [1, 3].
    #[serde(default = "defaults::det_unclip_ratio")]
    pub text_det_unclip_ratio: f64,
    /// Recognition score threshold, in [0, 1].
    #[serde(default)]
    pub text_rec_score_thresh: f64,
    /// Produce a visualization image served under `/static/vis`.
    #[serde(default)]
    pub visualize: bool,
    /// PDF render DPI, in [72, 300].
    #[serde(default = "defaults::pdf_dpi")]
    pub pdf_dpi: i32,
    /// PDF page cap, in [1, 100].
    #[serde(default = "defaults::pdf_max_pages")]
    pub pdf_max_pages: i32,
}

mod defaults {
    pub fn file_type() -> i32 {
        super::FILE_TYPE_IMAGE
    }
    pub fn det_limit_side_len() -> i64 {
        64
    }
    pub fn det_limit_type() -> String {
        "min".to_string()
    }
    pub fn det_thresh() -> f64 {
        0.3
    }
    pub fn det_box_thresh() -> f64 {
        0.6
    }
    pub fn det_unclip_ratio() -> f64 {
        1.5
    }
    pub fn pdf_dpi() -> i32 {
        super::DEFAULT_DPI
    }
    pub fn pdf_max_pages() -> i32 {
        super::DEFAULT_MAX_PAGES
    }
}

impl OcrRequest {
    /// Validates the request, returning the file payload on success.
    ///
    /// `textDetLimitSideLen` and `textDetLimitType` are accepted but not
    /// used: the detector's variants are trained at fixed long sides, so a
    /// caller-specified side cannot be honored. They are validated leniently
    /// and logged, never silently dropped.
    pub fn validate(&self) -> Result<&str, ApiError> {
        let file = self
            .file
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| {
                ApiError::MissingParameter("Missing required parameter: 'file'".to_string())
            })?;

        if self.file_type != FILE_TYPE_IMAGE && self.file_type != FILE_TYPE_PDF {
            return Err(ApiError::InvalidParameter(
                "fileType must be 0 (PDF) or 1 (image)".to_string(),
            ));
        }

        if self.text_det_limit_side_len < 1 {
            warn!(
                value = self.text_det_limit_side_len,
                "textDetLimitSideLen is too small; default model selection is used"
            );
        }
        if self.text_det_limit_type != "min" && self.text_det_limit_type != "max" {
            warn!(
                value = %self.text_det_limit_type,
                "textDetLimitType is invalid (should be 'min' or 'max'); ignored"
            );
        }
        debug!(
            limit_side_len = self.text_det_limit_side_len,
            limit_type = %self.text_det_limit_type,
            "detection limit parameters accepted but ignored; model variants are fixed at 640/960"
        );

        if !(0.0..=1.0).contains(&self.text_det_thresh) {
            return Err(ApiError::InvalidParameter(
                "textDetThresh must be in range [0.0, 1.0]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.text_det_box_thresh) {
            return Err(ApiError::InvalidParameter(
                "textDetBoxThresh must be in range [0.0, 1.0]".to_string(),
            ));
        }
        if !(1.0..=3.0).contains(&self.text_det_unclip_ratio) {
            return Err(ApiError::InvalidParameter(
                "textDetUnclipRatio must be in range [1.0, 3.0]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.text_rec_score_thresh) {
            return Err(ApiError::InvalidParameter(
                "textRecScoreThresh must be in range [0.0, 1.0]".to_string(),
            ));
        }

        Ok(file)
    }

    /// The per-task pipeline configuration this request asks for.
    pub fn task_config(&self) -> TaskConfig {
        TaskConfig {
            use_doc_orientation: self.use_doc_orientation_classify,
            use_unwarping: self.use_doc_unwarping,
            use_textline_orientation: self.use_textline_orientation,
            det_thresh: self.text_det_thresh as f32,
            det_box_thresh: self.text_det_box_thresh as f32,
            det_unclip_ratio: self.text_det_unclip_ratio as f32,
            rec_score_thresh: self.text_rec_score_thresh as f32,
        }
    }

    /// The PDF options this request asks for.
    pub fn pdf_options(&self) -> PdfOptions {
        PdfOptions {
            dpi: self.pdf_dpi,
            max_pages: self.pdf_max_pages,
            ..PdfOptions::default()
        }
    }
}

/// One image's (or page's) worth of results in the response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResultEntry {
    /// Recognized strings in reading order.
    pub texts: Vec<String>,
    /// Confidence per text.
    pub scores: Vec<f32>,
    /// Quadrilateral per text: four [x, y] corners.
    pub boxes: Vec<[[f32; 2]; 4]>,
    /// URL of the rendered visualization, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization_url: Option<String>,
}

impl OcrResultEntry {
    /// Builds a response entry from pipeline entries.
    pub fn from_entries(entries: &[TextEntry], visualization_url: Option<String>) -> Self {
        Self {
            texts: entries.iter().map(|e| e.text.clone()).collect(),
            scores: entries.iter().map(|e| e.confidence).collect(),
            boxes: entries
                .iter()
                .map(|e| e.quad.map(|p| [p.x, p.y]))
                .collect(),
            visualization_url,
        }
    }
}

/// The `/ocr` success body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    /// Zero on success.
    pub error_code: i32,
    /// Empty on success.
    pub error_msg: String,
    /// One entry per image or rendered page, in page order.
    pub ocr_results: Vec<OcrResultEntry>,
}

impl OcrResponse {
    /// Builds the success body.
    pub fn success(ocr_results: Vec<OcrResultEntry>) -> Self {
        Self {
            error_code: crate::errors::codes::SUCCESS,
            error_msg: String::new(),
            ocr_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_json(extra: &str) -> OcrRequest {
        let body = format!(r#"{{"file": "aGVsbG8="{extra}}}"#);
        serde_json::from_str(&body).unwrap()
    }

    #[test]
    fn defaults_match_the_api_contract() {
        let req = request_json("");
        assert_eq!(req.file_type, FILE_TYPE_IMAGE);
        assert!(!req.use_doc_orientation_classify);
        assert!(!req.use_doc_unwarping);
        assert!(!req.use_textline_orientation);
        assert_eq!(req.text_det_thresh, 0.3);
        assert_eq!(req.text_det_box_thresh, 0.6);
        assert_eq!(req.text_det_unclip_ratio, 1.5);
        assert_eq!(req.text_rec_score_thresh, 0.0);
        assert!(!req.visualize);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn missing_file_is_rejected_with_the_contract_message() {
        let req: OcrRequest = serde_json::from_str("{}").unwrap();
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: 'file'");
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let err = request_json(r#", "textDetThresh": 1.5"#).validate().unwrap_err();
        assert_eq!(err.to_string(), "textDetThresh must be in range [0.0, 1.0]");

        let err = request_json(r#", "textDetBoxThresh": -0.1"#)
            .validate()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "textDetBoxThresh must be in range [0.0, 1.0]"
        );

        let err = request_json(r#", "textDetUnclipRatio": 0.5"#)
            .validate()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "textDetUnclipRatio must be in range [1.0, 3.0]"
        );

        let err = request_json(r#", "textRecScoreThresh": 2.0"#)
            .validate()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "textRecScoreThresh must be in range [0.0, 1.0]"
        );
    }

    #[test]
    fn boundary_threshold_values_pass() {
        assert!(request_json(r#", "textDetThresh": 0.0"#).validate().is_ok());
        assert!(request_json(r#", "textDetThresh": 1.0"#).validate().is_ok());
        assert!(request_json(r#", "textDetUnclipRatio": 1.0"#).validate().is_ok());
        assert!(request_json(r#", "textDetUnclipRatio": 3.0"#).validate().is_ok());
    }

    #[test]
    fn limit_parameters_are_accepted_without_effect() {
        let req = request_json(r#", "textDetLimitSideLen": 0, "textDetLimitType": "weird""#);
        // Lenient: warnings only, the request still validates.
        assert!(req.validate().is_ok());
    }

    #[test]
    fn task_config_mirrors_the_request() {
        let req = request_json(
            r#", "useTextlineOrientation": true, "textDetThresh": 0.4, "textRecScoreThresh": 0.7"#,
        );
        let cfg = req.task_config();
        assert!(cfg.use_textline_orientation);
        assert!((cfg.det_thresh - 0.4).abs() < 1e-6);
        assert!((cfg.rec_score_thresh - 0.7).abs() < 1e-6);
    }
}
