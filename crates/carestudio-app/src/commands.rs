// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command implementations: read inputs, call into the document and vision
// crates, write outputs.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use carestudio_core::alerts;
use carestudio_core::config::AppConfig;
use carestudio_core::detect::NoDetection;
use carestudio_core::types::SourceFile;
use carestudio_document::convert::{self, OutputFile};
use carestudio_document::scan::batch::{BatchOptions, run_batch};
use carestudio_vision::{DetectionServer, HttpCornerDetector, ServiceAccount, VisionClient};

/// Read every path, failing on the first unreadable one.
fn read_all(paths: &[PathBuf]) -> anyhow::Result<Vec<SourceFile>> {
    paths
        .iter()
        .map(|path| SourceFile::read(path).with_context(|| format!("reading {}", path.display())))
        .collect()
}

/// Write `output` into `out_dir` (created if needed) and return its path.
fn write_output(out_dir: &Path, output: &OutputFile) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let path = out_dir.join(&output.name);
    std::fs::write(&path, &output.bytes)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = output.bytes.len(), "Output written");
    Ok(path)
}

pub async fn scan(
    config: &AppConfig,
    images: &[PathBuf],
    out_dir: &Path,
    offline: bool,
) -> anyhow::Result<()> {
    // Unreadable files are skipped like undecodable ones.
    let mut files = Vec::with_capacity(images.len());
    for path in images {
        match SourceFile::read(path) {
            Ok(file) => files.push(file),
            Err(err) => {
                let name = path.display().to_string();
                warn!(file = %name, error = %err, "Skipping unreadable file");
                eprintln!("{}", alerts::file_failed(&name, &err));
            }
        }
    }

    let options = BatchOptions {
        concurrency: config.detection_concurrency,
        jpeg_quality: config.scan_jpeg_quality,
    };

    let batch = if offline {
        run_batch(files, &NoDetection, options).await
    } else {
        let detector = HttpCornerDetector::new(config.scan_endpoint.as_str());
        run_batch(files, &detector, options).await
    };

    for failure in &batch.failures {
        eprintln!("{}", failure.alert);
    }

    let pdf = batch.to_pdf()?;
    let path = write_output(out_dir, &pdf)?;
    println!(
        "{} ({} pages, {} auto-cropped)",
        path.display(),
        batch.pages.len(),
        batch.detected_count()
    );
    Ok(())
}

pub fn jpg_to_pdf(images: &[PathBuf], out_dir: &Path) -> anyhow::Result<()> {
    let sources = read_all(images)?;
    let pdf = convert::jpg_to_pdf(&sources)?;
    let path = write_output(out_dir, &pdf)?;
    println!("{}", path.display());
    Ok(())
}

pub fn merge(pdfs: &[PathBuf], out_dir: &Path) -> anyhow::Result<()> {
    let sources = read_all(pdfs)?;
    let merged = convert::merge_pdfs(&sources)?;
    let path = write_output(out_dir, &merged)?;
    println!("{}", path.display());
    Ok(())
}

#[cfg(feature = "render")]
pub fn pdf_to_jpg(config: &AppConfig, pdf: &Path, out_dir: &Path) -> anyhow::Result<()> {
    use carestudio_document::PdfiumRasterizer;

    let source = SourceFile::read(pdf).with_context(|| format!("reading {}", pdf.display()))?;
    let rasterizer = PdfiumRasterizer::new()?;
    let pages = convert::pdf_to_jpg(
        &source,
        &rasterizer,
        config.render_scale,
        config.render_jpeg_quality,
    )?;

    for page in &pages {
        let path = write_output(out_dir, page)?;
        println!("{}", path.display());
    }
    Ok(())
}

#[cfg(not(feature = "render"))]
pub fn pdf_to_jpg(_config: &AppConfig, _pdf: &Path, _out_dir: &Path) -> anyhow::Result<()> {
    anyhow::bail!("this build of carestudio has no PDF rendering support (feature `render`)")
}

pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let account = ServiceAccount::from_env()?;
    let client = VisionClient::new(account)?;

    let mut server = DetectionServer::new(client, config);
    let addr = server.start().await?;
    println!("Listening on http://{addr}/api/scan");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    server.stop().await?;
    Ok(())
}
