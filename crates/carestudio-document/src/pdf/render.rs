// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page rasterization. The real implementation binds the pdfium shared
// library at runtime; tests substitute their own `PageRasterizer`.

use ::image::DynamicImage;
use carestudio_core::error::Result;

/// Renders every page of a PDF to an image.
pub trait PageRasterizer {
    /// Render all pages, in order, at `scale` times their natural size
    /// (1 PDF point = 1 pixel at scale 1.0).
    fn rasterize(&self, pdf: &[u8], scale: f32) -> Result<Vec<DynamicImage>>;
}

#[cfg(feature = "render")]
pub use pdfium::PdfiumRasterizer;

#[cfg(feature = "render")]
mod pdfium {
    use ::image::DynamicImage;
    use carestudio_core::error::{CareStudioError, Result};
    use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
    use tracing::{debug, info, instrument};

    use super::PageRasterizer;

    /// Rasterizer backed by pdfium. The library is looked up next to the
    /// executable first, then on the system library path.
    pub struct PdfiumRasterizer {
        pdfium: Pdfium,
    }

    impl PdfiumRasterizer {
        pub fn new() -> Result<Self> {
            let bindings =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|err| {
                        CareStudioError::RenderError(format!(
                            "pdfium library not available: {:?}",
                            err
                        ))
                    })?;
            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }
    }

    impl PageRasterizer for PdfiumRasterizer {
        #[instrument(skip(self, pdf), fields(bytes_len = pdf.len(), scale))]
        fn rasterize(&self, pdf: &[u8], scale: f32) -> Result<Vec<DynamicImage>> {
            let document = self
                .pdfium
                .load_pdf_from_byte_slice(pdf, None)
                .map_err(|err| CareStudioError::PdfError(format!("{:?}", err)))?;

            let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
            let pages = document.pages();
            info!(pages = pages.len(), "Rendering PDF pages");

            let mut images = Vec::with_capacity(pages.len() as usize);
            for (index, page) in pages.iter().enumerate() {
                let bitmap = page.render_with_config(&render_config).map_err(|err| {
                    CareStudioError::RenderError(format!("page {}: {:?}", index + 1, err))
                })?;
                let image = bitmap.as_image();
                debug!(
                    page = index + 1,
                    width = image.width(),
                    height = image.height(),
                    "Page rendered"
                );
                images.push(image);
            }

            Ok(images)
        }
    }
}
