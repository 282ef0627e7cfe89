// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// carestudio-document: Document processing for the CareStudio tools.
//
// Provides the scan pipeline (perspective correction, adaptive binarization,
// sharpening, batch orchestration), PDF assembly from images, PDF merging and
// PDF page rasterization.

pub mod convert;
pub mod image;
pub mod pdf;
pub mod scan;

// Re-export the primary structs so callers can use `carestudio_document::PdfWriter` etc.
pub use convert::{OutputFile, jpg_to_pdf, merge_pdfs, pdf_to_jpg};
pub use image::processor::ImageProcessor;
pub use pdf::reader::PdfReader;
pub use pdf::render::PageRasterizer;
pub use pdf::writer::PdfWriter;
pub use scan::batch::{BatchOptions, ProcessedPage, ScanBatch, ScanFailure, run_batch};
pub use scan::correct::{CorrectedImage, Rectification, ScanCorrector, correct_scan};

#[cfg(feature = "render")]
pub use pdf::render::PdfiumRasterizer;
