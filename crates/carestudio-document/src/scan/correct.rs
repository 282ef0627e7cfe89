// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan correction pipeline: perspective rectification (or plain resize when
// no corners are known), portrait orientation, Gaussian adaptive
// binarization and sharpening for photographed document pages.

use carestudio_core::error::Result;
use carestudio_core::types::{CornerSet, TARGET_HEIGHT_PX, TARGET_WIDTH_PX};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
use imageproc::filter::{filter3x3, separable_filter_equal};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument, warn};

use crate::image::processor::{ImageProcessor, encode_jpeg, jpeg_data_url};

/// Neighbourhood size for the adaptive threshold.
pub const ADAPTIVE_BLOCK_SIZE: u32 = 25;

/// Constant subtracted from the local mean before thresholding.
pub const ADAPTIVE_OFFSET: i32 = 11;

/// 3x3 sharpening kernel, row-major.
pub const SHARPEN_KERNEL: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];

/// How the page was mapped onto the target canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rectification {
    /// Corners were known: perspective-warp the quadrilateral onto the canvas.
    Detected(CornerSet),
    /// No usable corners: stretch the whole image onto the canvas.
    Fallback,
}

impl Rectification {
    pub fn from_corners(corners: Option<CornerSet>) -> Self {
        match corners {
            Some(corners) => Self::Detected(corners),
            None => Self::Fallback,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }
}

/// Output of the correction pipeline.
#[derive(Debug, Clone)]
pub struct CorrectedImage {
    /// Encoded JPEG bytes.
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// The rectification actually applied (degenerate corners end up as
    /// `Fallback`).
    pub rectification: Rectification,
}

impl CorrectedImage {
    pub fn to_data_url(&self) -> String {
        jpeg_data_url(&self.jpeg)
    }
}

/// Run the whole correction pipeline on one encoded image.
///
/// 1. Decode
/// 2. Perspective warp onto 900x1273 (`Detected`) or exact resize (`Fallback`)
/// 3. Rotate to portrait if needed
/// 4. Grayscale + Gaussian adaptive threshold (block 25, offset 11)
/// 5. 3x3 sharpen
/// 6. JPEG encode at `jpeg_quality`
///
/// Only an undecodable image or an encoder failure is an error; missing or
/// unusable corners always take the fallback path.
#[instrument(skip(image_bytes, corners), fields(bytes_len = image_bytes.len(), has_corners = corners.is_some()))]
pub fn correct_scan(
    image_bytes: &[u8],
    corners: Option<CornerSet>,
    jpeg_quality: u8,
) -> Result<CorrectedImage> {
    let corrector = ScanCorrector::from_bytes(image_bytes)?;
    let (rectified, rectification) = corrector.rectify(Rectification::from_corners(corners));

    let enhanced = rectified
        .ensure_portrait()
        .binarize_gaussian(ADAPTIVE_BLOCK_SIZE, ADAPTIVE_OFFSET)
        .sharpen();

    let image = enhanced.into_dynamic();
    let jpeg = encode_jpeg(&image, jpeg_quality)?;

    info!(
        width = image.width(),
        height = image.height(),
        detected = rectification.is_detected(),
        jpeg_bytes = jpeg.len(),
        "Scan corrected"
    );

    Ok(CorrectedImage {
        jpeg,
        width: image.width(),
        height: image.height(),
        rectification,
    })
}

/// Step-by-step access to the correction pipeline.
pub struct ScanCorrector {
    /// The working image.
    image: DynamicImage,
}

impl ScanCorrector {
    // -- Construction ---------------------------------------------------------

    /// Create a corrector from raw image bytes (JPEG, PNG, etc.).
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let processor = ImageProcessor::from_bytes(data)?;
        Ok(Self {
            image: processor.into_dynamic(),
        })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Rectification --------------------------------------------------------

    /// Map the page onto the fixed 900x1273 canvas.
    ///
    /// Returns the rectification that was actually applied: `Detected` corners
    /// that do not span a usable quadrilateral are downgraded to `Fallback`.
    pub fn rectify(self, rectification: Rectification) -> (Self, Rectification) {
        if let Rectification::Detected(corners) = rectification {
            match self.warp_to_target(&corners) {
                Some(warped) => return (warped, rectification),
                None => warn!(
                    corners = ?corners.points(),
                    "Corners do not form a usable quadrilateral; falling back to resize"
                ),
            }
        } else {
            warn!("No corners available; using simple resize");
        }

        let resized = ImageProcessor::from_dynamic(self.image)
            .resize_exact(TARGET_WIDTH_PX, TARGET_HEIGHT_PX)
            .into_dynamic();
        (Self { image: resized }, Rectification::Fallback)
    }

    /// Perspective-warp the quadrilateral onto the target canvas.
    fn warp_to_target(&self, corners: &CornerSet) -> Option<Self> {
        let src = corners.as_tuples();
        if shoelace_area(&src) < 1.0 {
            return None;
        }

        let (w, h) = (TARGET_WIDTH_PX as f32, TARGET_HEIGHT_PX as f32);
        let dest: [(f32, f32); 4] = [
            (0.0, 0.0), // top-left
            (w, 0.0),   // top-right
            (w, h),     // bottom-right
            (0.0, h),   // bottom-left
        ];

        let projection = Projection::from_control_points(src, dest)?;

        let rgba_input = self.image.to_rgba8();
        let mut output = RgbaImage::new(TARGET_WIDTH_PX, TARGET_HEIGHT_PX);
        warp_into(
            &rgba_input,
            &projection,
            Interpolation::Bilinear,
            Rgba([255u8, 255, 255, 255]),
            &mut output,
        );

        debug!(
            src = ?src,
            out_w = TARGET_WIDTH_PX,
            out_h = TARGET_HEIGHT_PX,
            "Perspective correction applied"
        );

        Some(Self {
            image: DynamicImage::ImageRgba8(output),
        })
    }

    /// Rotate landscape output to portrait.
    pub fn ensure_portrait(self) -> Self {
        Self {
            image: ImageProcessor::from_dynamic(self.image)
                .ensure_portrait()
                .into_dynamic(),
        }
    }

    // -- Enhancement ----------------------------------------------------------

    /// Gaussian adaptive threshold to pure black and white.
    ///
    /// The threshold for each pixel is the Gaussian-weighted mean of its
    /// `block_size` x `block_size` neighbourhood (rounded to an integer) minus
    /// `c`; pixels above it become white. Borders replicate the edge pixels.
    pub fn binarize_gaussian(self, block_size: u32, c: i32) -> Self {
        let gray = self.image.to_luma8();
        let means = gaussian_local_mean(&gray, block_size as usize);

        let output = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let value = gray.get_pixel(x, y).0[0] as i32;
            let mean = means.get_pixel(x, y).0[0].round() as i32;
            Luma([if value - mean > -c { 255u8 } else { 0u8 }])
        });

        debug!(block_size, c, "Adaptive binarization complete");
        Self {
            image: DynamicImage::ImageLuma8(output),
        }
    }

    /// Apply [`SHARPEN_KERNEL`] with saturation to 0..=255. Borders
    /// replicate the edge pixels.
    pub fn sharpen(self) -> Self {
        let gray = self.image.to_luma8();
        let output: GrayImage = filter3x3::<_, i32, u8>(&gray, &SHARPEN_KERNEL);
        Self {
            image: DynamicImage::ImageLuma8(output),
        }
    }
}

// -- Filter helpers -----------------------------------------------------------

/// Normalised 1-D Gaussian kernel of odd length `size`, with the sigma OpenCV
/// derives from the block size: `0.3 * ((size - 1) / 2 - 1) + 0.8`.
fn gaussian_kernel(size: usize) -> Vec<f32> {
    let size = size.max(1) | 1;
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i32;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Gaussian-weighted local mean of `gray`, kept in floating point so the
/// caller can round it.
fn gaussian_local_mean(gray: &GrayImage, block_size: usize) -> ImageBuffer<Luma<f32>, Vec<f32>> {
    let levels = ImageBuffer::<Luma<f32>, Vec<f32>>::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([gray.get_pixel(x, y).0[0] as f32])
    });
    separable_filter_equal(&levels, &gaussian_kernel(block_size))
}

/// Area of a quadrilateral given by four vertices in order (shoelace formula).
fn shoelace_area(corners: &[(f32, f32); 4]) -> f32 {
    let n = corners.len();
    let mut area = 0.0f32;
    for i in 0..n {
        let j = (i + 1) % n;
        area += corners[i].0 * corners[j].1;
        area -= corners[j].0 * corners[i].1;
    }
    area.abs() / 2.0
}

// -- Tests --------------------------------------------------------------------
