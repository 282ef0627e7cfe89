// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page annotation seam and the subset of the Vision `images:annotate`
// response that the endpoint reads.

use std::future::Future;

use serde::{Deserialize, Serialize};

use carestudio_core::error::{CareStudioError, Result};

/// A bounding-polygon vertex in image pixels. The Vision API omits
/// zero-valued coordinates, so both default to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
}

/// Finds the page boundary in an image using document text detection.
pub trait PageAnnotator {
    /// `Ok(Some(vertices))` when the first text block of the first page has a
    /// bounding polygon, `Ok(None)` when nothing was found, `Err` for
    /// credential, transport or service failures.
    fn page_vertices(
        &self,
        image: &[u8],
    ) -> impl Future<Output = Result<Option<Vec<Vertex>>>> + Send;
}

// -- Response model -----------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct BatchAnnotateResponse {
    #[serde(default)]
    pub responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateImageResponse {
    pub full_text_annotation: Option<TextAnnotation>,
    pub error: Option<Status>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextAnnotation {
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub bounding_box: Option<BoundingPoly>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

/// `google.rpc.Status` as embedded in a per-image response.
#[derive(Debug, Default, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl BatchAnnotateResponse {
    /// Vertices of `fullTextAnnotation.pages[0].blocks[0].boundingBox`.
    ///
    /// A per-image error object is an error; a missing or empty polygon at
    /// any level is `None`.
    pub fn first_block_vertices(self) -> Result<Option<Vec<Vertex>>> {
        let Some(response) = self.responses.into_iter().next() else {
            return Ok(None);
        };

        if let Some(status) = response.error {
            return Err(CareStudioError::VisionService(format!(
                "image annotation failed (code {}): {}",
                status.code, status.message
            )));
        }

        let vertices = response
            .full_text_annotation
            .and_then(|annotation| annotation.pages.into_iter().next())
            .and_then(|page| page.blocks.into_iter().next())
            .and_then(|block| block.bounding_box)
            .map(|poly| poly.vertices)
            .filter(|vertices| !vertices.is_empty());

        Ok(vertices)
    }
}
