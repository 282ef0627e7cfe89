// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: build image-per-page PDF documents using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use ::image::DynamicImage;
use carestudio_core::error::{CareStudioError, Result};
use carestudio_core::types::PageSize;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};

/// At 72 DPI one image pixel is one PDF point, so the placement scale can be
/// handed to printpdf unchanged.
const PLACEMENT_DPI: f32 = 72.0;

/// Where an image lands on a page, in PDF points from the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Points per image pixel.
    pub scale: f32,
}

/// Scale an image to fit `page` (up or down), preserving aspect ratio, and
/// centre it. The constrained axis is filled edge to edge; the other axis
/// gets equal margins.
pub fn fit_centered(image_width: u32, image_height: u32, page: PageSize) -> Placement {
    let (img_w, img_h) = (image_width.max(1) as f32, image_height.max(1) as f32);
    let scale = (page.width_pt / img_w).min(page.height_pt / img_h);
    let width = img_w * scale;
    let height = img_h * scale;

    Placement {
        x: (page.width_pt - width) / 2.0,
        y: (page.height_pt - height) / 2.0,
        width,
        height,
        scale,
    }
}

/// Creates PDF documents with one raster image per page.
pub struct PdfWriter {
    /// Size of every generated page.
    page_size: PageSize,
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
    /// Embed pixels without printpdf's lossy image re-encoding.
    lossless: bool,
}

impl PdfWriter {
    /// Create a new writer targeting the given page size.
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            title: None,
            lossless: false,
        }
    }

    /// Create a new writer defaulting to A4.
    pub fn a4() -> Self {
        Self::new(PageSize::A4)
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Keep image data as decoded instead of letting printpdf re-compress it
    /// lossily. Used for pages that are already JPEG-compressed once.
    pub fn set_lossless(&mut self, lossless: bool) {
        self.lossless = lossless;
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// Page dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        (
            Mm(self.page_size.width_pt * 25.4 / 72.0),
            Mm(self.page_size.height_pt * 25.4 / 72.0),
        )
    }

    // -- Images to PDF --------------------------------------------------------

    /// Create a PDF with one page per image, in order. Each image is scaled
    /// to fit the page and centred (see [`fit_centered`]).
    #[instrument(skip_all, fields(images = images.len()))]
    pub fn create_from_images(&self, images: &[DynamicImage]) -> Result<Vec<u8>> {
        if images.is_empty() {
            return Err(CareStudioError::NoInput(
                "no images to place in the PDF.".into(),
            ));
        }

        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("CareStudio Document");
        info!(pages = images.len(), title, "Creating image PDF");

        let mut doc = PdfDocument::new(title);
        let mut pages: Vec<PdfPage> = Vec::with_capacity(images.len());

        for (index, image) in images.iter().enumerate() {
            let raw = raw_image(image);
            let (width, height) = (image.width(), image.height());
            let xobject_id = doc.add_image(&raw);

            let placement = fit_centered(width, height, self.page_size);
            debug!(
                page = index + 1,
                width,
                height,
                x = placement.x,
                y = placement.y,
                scale = placement.scale,
                "Image placed on page"
            );

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(placement.x)),
                    translate_y: Some(Pt(placement.y)),
                    scale_x: Some(placement.scale),
                    scale_y: Some(placement.scale),
                    dpi: Some(PLACEMENT_DPI),
                    rotate: None,
                },
            }];
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let options = if self.lossless {
            PdfSaveOptions {
                image_optimization: None,
                ..PdfSaveOptions::default()
            }
        } else {
            PdfSaveOptions::default()
        };
        let output = doc.save(&options, &mut warnings);
        if !warnings.is_empty() {
            debug!(warnings = warnings.len(), "printpdf reported warnings");
        }

        Ok(output)
    }
}

/// Grayscale images stay single-channel; everything else becomes RGB.
fn raw_image(image: &DynamicImage) -> RawImage {
    let (pixels, data_format) = match image {
        DynamicImage::ImageLuma8(gray) => (gray.as_raw().clone(), RawImageFormat::R8),
        DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
            (image.to_luma8().into_raw(), RawImageFormat::R8)
        }
        other => (other.to_rgb8().into_raw(), RawImageFormat::RGB8),
    };
    RawImage {
        pixels: RawImageData::U8(pixels),
        width: image.width() as usize,
        height: image.height() as usize,
        data_format,
        tag: Vec::new(),
    }
}
