//! PDF page rendering and fan-out.
//!
//! PDF bytes are rasterized with PDFium into one image per page; each page
//! then becomes an independent pipeline task and the document response is
//! regrouped from the per-page results in page order.
//!
//! PDFium itself is single-threaded, so the library lives on one dedicated
//! render thread behind a request channel (the same confinement idiom as
//! the inference client). The counting semaphore bounds how many document
//! renders are in flight at once; page-level parallelism comes from the
//! scheduler, not the rasterizer.

use crate::errors::{pdf_codes, ApiError};
use crossbeam_channel::{bounded, Sender};
use image::RgbImage;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Fixed width of the document-render semaphore.
const MAX_CONCURRENT_RENDERS: usize = 4;

/// Default render DPI.
pub const DEFAULT_DPI: i32 = 150;
/// Default page cap.
pub const DEFAULT_MAX_PAGES: i32 = 10;
/// Default per-page pixel cap (5000 x 5000).
pub const DEFAULT_MAX_PIXELS_PER_PAGE: i64 = 25_000_000;

const MIN_DPI: i32 = 72;
const MAX_DPI: i32 = 300;
const MIN_PAGES: i32 = 1;
const MAX_PAGES: i32 = 100;
const MIN_CONCURRENT: i32 = 1;
const MAX_CONCURRENT: i32 = 16;

/// PDF rendering options, validated per request.
#[derive(Debug, Clone)]
pub struct PdfOptions {
    /// Render DPI (points scale at 72 DPI).
    pub dpi: i32,
    /// Maximum number of pages rendered; later pages are ignored.
    pub max_pages: i32,
    /// Per-page rendered pixel cap.
    pub max_pixels_per_page: i64,
    /// Requested render concurrency; validated against [1, 16].
    pub max_concurrent_renders: i32,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            max_pages: DEFAULT_MAX_PAGES,
            max_pixels_per_page: DEFAULT_MAX_PIXELS_PER_PAGE,
            max_concurrent_renders: MAX_CONCURRENT_RENDERS as i32,
        }
    }
}

impl PdfOptions {
    /// Validates ranges, mirroring the API contract.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.dpi < MIN_DPI || self.dpi > MAX_DPI {
            return Err(ApiError::Pdf {
                code: pdf_codes::CONFIG_ERROR,
                message: format!("pdfDpi must be in range [{MIN_DPI}, {MAX_DPI}]"),
            });
        }
        if self.max_pages < MIN_PAGES || self.max_pages > MAX_PAGES {
            return Err(ApiError::Pdf {
                code: pdf_codes::CONFIG_ERROR,
                message: format!("pdfMaxPages must be in range [{MIN_PAGES}, {MAX_PAGES}]"),
            });
        }
        if self.max_concurrent_renders < MIN_CONCURRENT
            || self.max_concurrent_renders > MAX_CONCURRENT
        {
            return Err(ApiError::Pdf {
                code: pdf_codes::CONFIG_ERROR,
                message: format!(
                    "maxConcurrentRenders must be in range [{MIN_CONCURRENT}, {MAX_CONCURRENT}]"
                ),
            });
        }
        Ok(())
    }
}

/// One rendered page in document order.
#[derive(Debug)]
pub struct RenderedPage {
    /// Zero-based page index.
    pub index: usize,
    /// The rasterized page.
    pub image: RgbImage,
}

struct RenderRequest {
    bytes: Vec<u8>,
    options: PdfOptions,
    reply: Sender<Result<Vec<RenderedPage>, ApiError>>,
}

/// Handle to the PDF render thread.
pub struct PdfRenderer {
    submit_tx: Sender<RenderRequest>,
    semaphore: Arc<Semaphore>,
}

impl PdfRenderer {
    /// Binds PDFium and starts the render thread.
    ///
    /// Fails when no PDFium library can be found next to the executable or
    /// on the system paths.
    pub fn new() -> Result<Self, ApiError> {
        // Probe the binding on the calling thread first so startup fails
        // loudly instead of on the first request.
        bind_pdfium().map_err(|e| ApiError::Internal(e))?;

        let (submit_tx, submit_rx) = bounded::<RenderRequest>(MAX_CONCURRENT_RENDERS * 2);
        std::thread::Builder::new()
            .name("pdf-render".to_string())
            .spawn(move || {
                let pdfium = match bind_pdfium() {
                    Ok(pdfium) => pdfium,
                    Err(e) => {
                        warn!(error = %e, "PDF render thread failed to bind PDFium");
                        return;
                    }
                };
                for request in submit_rx {
                    let outcome = render_document(&pdfium, &request.bytes, &request.options);
                    if request.reply.send(outcome).is_err() {
                        debug!("PDF render reply abandoned");
                    }
                }
            })
            .map_err(|e| ApiError::Internal(format!("failed to spawn PDF render thread: {e}")))?;

        Ok(Self {
            submit_tx,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_RENDERS)),
        })
    }

    /// Renders up to `options.max_pages` pages of a PDF.
    ///
    /// Bounded by the render semaphore; blocks the async caller only on the
    /// semaphore, never on PDFium itself.
    pub async fn render(
        &self,
        bytes: Vec<u8>,
        options: PdfOptions,
    ) -> Result<Vec<RenderedPage>, ApiError> {
        options.validate()?;

        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ApiError::Internal("PDF render semaphore closed".to_string()))?;

        let (reply_tx, reply_rx) = bounded(1);
        self.submit_tx
            .send(RenderRequest {
                bytes,
                options,
                reply: reply_tx,
            })
            .map_err(|_| ApiError::Internal("PDF render thread is gone".to_string()))?;

        tokio::task::spawn_blocking(move || {
            reply_rx
                .recv()
                .map_err(|_| ApiError::Internal("PDF render thread dropped the reply".to_string()))?
        })
        .await
        .map_err(|e| ApiError::Internal(format!("PDF render join error: {e}")))?
    }
}

fn bind_pdfium() -> Result<Pdfium, String> {
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/lib")))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/local/lib"))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| format!("could not find PDFium library: {e}"))
}

fn render_document(
    pdfium: &Pdfium,
    bytes: &[u8],
    options: &PdfOptions,
) -> Result<Vec<RenderedPage>, ApiError> {
    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let description = format!("{e:?}");
        if description.contains("Password") {
            ApiError::Pdf {
                code: pdf_codes::PASSWORD_REQUIRED,
                message: "PDF is password protected".to_string(),
            }
        } else {
            ApiError::Pdf {
                code: pdf_codes::FORMAT_ERROR,
                message: format!("Failed to load PDF document: {e}"),
            }
        }
    })?;

    let total_pages = document.pages().len() as i32;
    if total_pages == 0 {
        return Err(ApiError::Pdf {
            code: pdf_codes::FORMAT_ERROR,
            message: "PDF has no pages".to_string(),
        });
    }

    let pages_to_render = total_pages.min(options.max_pages);
    if total_pages > options.max_pages {
        warn!(
            total_pages,
            rendered = pages_to_render,
            "PDF page count exceeds maxPages; later pages are ignored"
        );
    }

    let scale = options.dpi as f32 / 72.0;
    let mut rendered = Vec::with_capacity(pages_to_render as usize);

    for (index, page) in document.pages().iter().take(pages_to_render as usize).enumerate() {
        let width_px = (page.width().value * scale) as i32;
        let height_px = (page.height().value * scale) as i32;

        let pixels = width_px as i64 * height_px as i64;
        if pixels > options.max_pixels_per_page {
            return Err(ApiError::Pdf {
                code: pdf_codes::PAGE_SIZE_ERROR,
                message: format!(
                    "Page {} size {}x{} ({} pixels) exceeds limit {}",
                    index, width_px, height_px, pixels, options.max_pixels_per_page
                ),
            });
        }

        let render_config = PdfRenderConfig::new()
            .set_target_width(width_px)
            .set_target_height(height_px)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = page.render_with_config(&render_config).map_err(|e| ApiError::Pdf {
            code: pdf_codes::PAGE_ERROR,
            message: format!("Failed to render page {index}: {e}"),
        })?;

        rendered.push(RenderedPage {
            index,
            image: bitmap.as_image().to_rgb8(),
        });
    }

    info!(pages = rendered.len(), total_pages, "PDF rendered");
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_validation_covers_every_range() {
        assert!(PdfOptions::default().validate().is_ok());

        let bad_dpi = PdfOptions {
            dpi: 71,
            ..PdfOptions::default()
        };
        assert!(matches!(
            bad_dpi.validate(),
            Err(ApiError::Pdf {
                code: pdf_codes::CONFIG_ERROR,
                ..
            })
        ));

        let bad_pages = PdfOptions {
            max_pages: 101,
            ..PdfOptions::default()
        };
        assert!(bad_pages.validate().is_err());

        let bad_concurrency = PdfOptions {
            max_concurrent_renders: 0,
            ..PdfOptions::default()
        };
        assert!(bad_concurrency.validate().is_err());

        let edge = PdfOptions {
            dpi: 300,
            max_pages: 100,
            max_concurrent_renders: 16,
            ..PdfOptions::default()
        };
        assert!(edge.validate().is_ok());
    }
}
