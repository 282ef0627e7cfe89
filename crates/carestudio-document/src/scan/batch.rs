// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch scanning: detect corners and correct each input file, collect the
// pages in input order and assemble them into one PDF.

use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use carestudio_core::alerts::{self, Alert};
use carestudio_core::detect::CornerDetector;
use carestudio_core::error::{CareStudioError, Result};
use carestudio_core::integrity::short_digest;
use carestudio_core::types::{SourceFile, output_names};

use crate::convert::OutputFile;
use crate::pdf::writer::PdfWriter;
use crate::scan::correct::{CorrectedImage, correct_scan};

/// Knobs for one batch run.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// How many files may be in detection/correction at once. `0` and `1`
    /// both mean strictly sequential.
    pub concurrency: usize,
    /// JPEG quality for the corrected pages.
    pub jpeg_quality: u8,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            jpeg_quality: 100,
        }
    }
}

/// One successfully corrected input file.
#[derive(Debug, Clone)]
pub struct ProcessedPage {
    /// Name of the input file.
    pub name: String,
    /// Short SHA-256 of the input bytes, for log correlation.
    pub source_digest: String,
    pub image: CorrectedImage,
}

/// One input file that could not be processed.
#[derive(Debug, Clone)]
pub struct ScanFailure {
    pub name: String,
    /// Technical reason, as logged.
    pub reason: String,
    /// What to show the user.
    pub alert: Alert,
}

/// Everything a batch run produced: corrected pages in input order plus the
/// files that were skipped.
#[derive(Debug, Clone, Default)]
pub struct ScanBatch {
    pub pages: Vec<ProcessedPage>,
    pub failures: Vec<ScanFailure>,
}

impl ScanBatch {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Number of pages whose corners were detected (the rest used the
    /// fallback resize).
    pub fn detected_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|page| page.image.rectification.is_detected())
            .count()
    }

    /// Assemble `CareStudio_Scanned.pdf` with one A4 page per processed image.
    pub fn to_pdf(&self) -> Result<OutputFile> {
        if self.pages.is_empty() {
            return Err(CareStudioError::NoInput("no processed images found.".into()));
        }

        let images = self
            .pages
            .iter()
            .map(|page| {
                ::image::load_from_memory(&page.image.jpeg).map_err(|err| {
                    CareStudioError::ImageError(format!("{}: {}", page.name, err))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut writer = PdfWriter::a4();
        writer.set_title("CareStudio Scan");
        writer.set_lossless(true);
        let bytes = writer.create_from_images(&images)?;
        Ok(OutputFile::new(output_names::SCANNED_PDF, bytes))
    }
}

/// Scan every file: detect its corners, then correct it on the blocking
/// pool. A file that fails is recorded in [`ScanBatch::failures`] and the
/// batch carries on. Pages come back in input order regardless of
/// `options.concurrency`.
#[instrument(skip_all, fields(files = files.len(), concurrency = options.concurrency))]
pub async fn run_batch<D>(files: Vec<SourceFile>, detector: &D, options: BatchOptions) -> ScanBatch
where
    D: CornerDetector + Sync,
{
    let limit = options.concurrency.max(1);
    let quality = options.jpeg_quality;

    let outcomes: Vec<(String, String, Result<CorrectedImage>)> = stream::iter(files)
        .map(|file| scan_one(file, detector, quality))
        .buffered(limit)
        .collect()
        .await;

    let mut batch = ScanBatch::default();
    for (name, source_digest, outcome) in outcomes {
        match outcome {
            Ok(image) => batch.pages.push(ProcessedPage {
                name,
                source_digest,
                image,
            }),
            Err(err) => {
                warn!(file = %name, digest = %source_digest, error = %err, "Skipping file");
                batch.failures.push(ScanFailure {
                    alert: alerts::file_failed(&name, &err),
                    reason: err.to_string(),
                    name,
                });
            }
        }
    }

    info!(
        pages = batch.pages.len(),
        detected = batch.detected_count(),
        failed = batch.failures.len(),
        "Batch scan finished"
    );
    batch
}

async fn scan_one<D>(
    file: SourceFile,
    detector: &D,
    quality: u8,
) -> (String, String, Result<CorrectedImage>)
where
    D: CornerDetector + Sync,
{
    let digest = short_digest(&file.bytes);
    let corners = detector.detect(&file.bytes).await;

    let SourceFile { name, bytes } = file;
    let corrected = tokio::task::spawn_blocking(move || correct_scan(&bytes, corners, quality))
        .await
        .map_err(|err| CareStudioError::ImageError(format!("correction task failed: {}", err)))
        .and_then(|result| result);

    (name, digest, corrected)
}
