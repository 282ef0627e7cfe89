// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: corner geometry, page and canvas sizes, input files and
// output naming.

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CareStudioError, Result};

/// Width of the corrected scan canvas in pixels.
pub const TARGET_WIDTH_PX: u32 = 900;

/// ISO A-series aspect ratio (height / width).
pub const A4_RATIO: f64 = 1.4142;

/// Height of the corrected scan canvas: `round(900 * 1.4142)`.
pub const TARGET_HEIGHT_PX: u32 = 1273;

/// A point in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Exactly four document corners in canonical order.
///
/// Canonical order: points sorted by angle about their centroid, then rotated
/// so that the point with the smallest `x + y` comes first. In image
/// coordinates (y grows downward) this yields top-left, top-right,
/// bottom-right, bottom-left for an upright document, which is the order the
/// perspective mapping expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CornerSet([Point; 4]);

impl CornerSet {
    /// Build a corner set from exactly four points, in any order.
    ///
    /// Callers must pass finite coordinates; use [`CornerSet::from_points`]
    /// for untrusted input.
    pub fn new(points: [Point; 4]) -> Self {
        debug_assert!(
            points.iter().all(|p| p.x.is_finite() && p.y.is_finite()),
            "corner coordinates must be finite"
        );
        Self(canonical_order(points))
    }

    /// Build a corner set from a slice. Anything other than four finite
    /// points is rejected.
    pub fn from_points(points: &[Point]) -> Result<Self> {
        let array: [Point; 4] = points.try_into().map_err(|_| {
            CareStudioError::Detection(format!("expected 4 corners, got {}", points.len()))
        })?;
        if array.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(CareStudioError::Detection(
                "corner coordinates must be finite".into(),
            ));
        }
        Ok(Self::new(array))
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    /// Corners as `(x, y)` tuples, the shape `imageproc` projections take.
    pub fn as_tuples(&self) -> [(f32, f32); 4] {
        self.0.map(|p| (p.x, p.y))
    }
}

/// Sort by angle about the centroid, then rotate the minimum-(x+y) point to
/// the front.
fn canonical_order(mut points: [Point; 4]) -> [Point; 4] {
    let cx = points.iter().map(|p| p.x).sum::<f32>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f32>() / 4.0;

    points.sort_by(|a, b| {
        let angle_a = (a.y - cy).atan2(a.x - cx);
        let angle_b = (b.y - cy).atan2(b.x - cx);
        angle_a.partial_cmp(&angle_b).unwrap_or(Ordering::Equal)
    });

    let mut first = 0;
    let mut min_sum = f32::INFINITY;
    for (i, p) in points.iter().enumerate() {
        let sum = p.x + p.y;
        if sum < min_sum {
            min_sum = sum;
            first = i;
        }
    }

    points.rotate_left(first);
    points
}

/// A PDF page size in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// ISO A4 as used by every CareStudio PDF.
    pub const A4: Self = Self {
        width_pt: 595.28,
        height_pt: 841.89,
    };
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// A user-supplied file: its display name and raw bytes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, naming it after its final path component.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

/// Deterministic names for generated files.
pub mod output_names {
    pub const CONVERTED_PDF: &str = "CareStudio_Converted.pdf";
    pub const MERGED_PDF: &str = "CareStudio_Merged.pdf";
    pub const SCANNED_PDF: &str = "CareStudio_Scanned.pdf";

    /// `<stem>_page_<n>.jpg`, where `<stem>` is `source_name` with its first
    /// `.pdf` removed and `page_number` is 1-based.
    pub fn page_image(source_name: &str, page_number: usize) -> String {
        let stem = source_name.replacen(".pdf", "", 1);
        format!("{stem}_page_{page_number}.jpg")
    }
}
