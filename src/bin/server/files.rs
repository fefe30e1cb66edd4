//! Input loading (base64 and URL) and visualization output.

use crate::errors::ApiError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::RgbImage;
use std::path::Path;
use tracing::{info, warn};

/// Maximum accepted payload for base64 inputs and URL downloads.
pub const MAX_FILE_BYTES: usize = 50 * 1024 * 1024;

/// Maximum accepted URL length.
pub const MAX_URL_LENGTH: usize = 2048;

/// Builds the download client. Certificate verification stays on unless the
/// operator explicitly disabled it at startup.
pub fn build_http_client(no_verify_ssl: bool) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().timeout(std::time::Duration::from_secs(10));
    if no_verify_ssl {
        warn!("SSL verification disabled for downloads - not recommended for production");
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build()
}

/// True when the `file` field is an HTTP(S) URL rather than base64 data.
pub fn is_url(file: &str) -> bool {
    file.starts_with("http://") || file.starts_with("https://")
}

/// Resolves the request's `file` field to raw bytes.
///
/// URLs are fetched with the configured client, capped at
/// [`MAX_FILE_BYTES`]; base64 payloads (optionally with a `data:` prefix)
/// are size-checked and decoded.
pub async fn fetch_input(file: &str, client: &reqwest::Client) -> Result<Vec<u8>, ApiError> {
    if is_url(file) {
        if file.len() > MAX_URL_LENGTH {
            return Err(ApiError::InvalidParameter(format!(
                "URL exceeds maximum length of {MAX_URL_LENGTH} characters"
            )));
        }

        let shown = file.get(..100).unwrap_or(file);
        info!(url = %shown, "downloading input");
        let response = client
            .get(file)
            .send()
            .await
            .map_err(|e| ApiError::DecodeFailed(format!("Failed to download file: {e}")))?;
        if !response.status().is_success() {
            return Err(ApiError::DecodeFailed(format!(
                "Failed to download file: HTTP {}",
                response.status().as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::DecodeFailed(format!("Failed to read download body: {e}")))?;
        if bytes.len() > MAX_FILE_BYTES {
            return Err(ApiError::InvalidParameter(
                "downloaded file exceeds maximum size of 50 MB".to_string(),
            ));
        }
        if bytes.is_empty() {
            return Err(ApiError::DecodeFailed("Downloaded empty file".to_string()));
        }
        Ok(bytes.to_vec())
    } else {
        if file.len() > MAX_FILE_BYTES {
            return Err(ApiError::InvalidParameter(
                "file exceeds maximum size of 50 MB".to_string(),
            ));
        }

        // Tolerate a data-URI prefix such as "data:image/png;base64,".
        let payload = match file.find(',') {
            Some(comma) if file[..comma].contains("base64") => &file[comma + 1..],
            _ => file,
        };
        let decoded = BASE64
            .decode(payload.trim())
            .map_err(|e| ApiError::DecodeFailed(format!("Failed to decode Base64 file: {e}")))?;
        if decoded.is_empty() {
            return Err(ApiError::DecodeFailed(
                "Base64 decode resulted in empty data".to_string(),
            ));
        }
        Ok(decoded)
    }
}

/// Decodes raw bytes into an RGB image.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ApiError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| ApiError::DecodeFailed(format!("Failed to decode image: {e}")))
}

/// Saves a visualization image under a random name, returning the file name.
pub fn save_visualization(image: &RgbImage, dir: &Path) -> Option<String> {
    let filename = format!("{}.png", uuid::Uuid::new_v4());
    let path = dir.join(&filename);
    match image.save(&path) {
        Ok(()) => {
            info!(path = %path.display(), "visualization saved");
            Some(filename)
        }
        Err(e) => {
            warn!(error = %e, "failed to save visualization image");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_detection() {
        assert!(is_url("https://example.com/x.png"));
        assert!(is_url("http://example.com/x.png"));
        assert!(!is_url("aGVsbG8="));
    }

    #[tokio::test]
    async fn oversized_url_is_rejected() {
        let client = build_http_client(false).unwrap();
        let url = format!("https://example.com/{}", "x".repeat(MAX_URL_LENGTH));
        let err = fetch_input(&url, &client).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn base64_with_data_prefix_decodes() {
        let client = build_http_client(false).unwrap();
        let payload = format!("data:image/png;base64,{}", BASE64.encode(b"pixels"));
        let bytes = fetch_input(&payload, &client).await.unwrap();
        assert_eq!(bytes, b"pixels");
    }

    #[tokio::test]
    async fn invalid_base64_is_a_decode_error() {
        let client = build_http_client(false).unwrap();
        let err = fetch_input("!!not-base64!!", &client).await.unwrap_err();
        assert!(matches!(err, ApiError::DecodeFailed(_)));
    }
}
