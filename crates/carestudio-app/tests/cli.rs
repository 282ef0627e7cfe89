// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end tests for the `carestudio` binary. None of them need network
// access or the pdfium library.

#![allow(deprecated)] // cargo_bin deprecation

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use predicates::prelude::*;

fn carestudio() -> Command {
    let mut cmd = Command::cargo_bin("carestudio").expect("binary 'carestudio' should be built");
    cmd.env("RUST_LOG", "warn")
        .env_remove("CARESTUDIO_SCAN_ENDPOINT")
        .env_remove("CARESTUDIO_PORT")
        .env_remove("CARESTUDIO_BIND")
        .env_remove("CARESTUDIO_DETECTION_CONCURRENCY");
    cmd
}

fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        if (x / 10 + y / 10) % 2 == 0 {
            Rgb([240, 240, 240])
        } else {
            Rgb([30, 30, 30])
        }
    }));
    let path = dir.join(name);
    img.save_with_format(&path, ImageFormat::Png).unwrap();
    path
}

#[test]
fn help_lists_every_command() {
    carestudio()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("jpg2pdf"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("pdf2jpg"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn jpg2pdf_writes_converted_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_image(dir.path(), "a.png", 120, 80);
    let b = write_image(dir.path(), "b.png", 60, 200);
    let out = dir.path().join("out");

    carestudio()
        .arg("jpg2pdf")
        .arg(&a)
        .arg(&b)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("CareStudio_Converted.pdf"));

    let pdf = std::fs::read(out.join("CareStudio_Converted.pdf")).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[test]
fn jpg2pdf_names_the_broken_file() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_image(dir.path(), "good.png", 40, 40);
    let bad = dir.path().join("broken.jpg");
    std::fs::write(&bad, b"not an image").unwrap();

    carestudio()
        .arg("jpg2pdf")
        .arg(&good)
        .arg(&bad)
        .arg("--out-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.jpg"));

    assert!(!dir.path().join("CareStudio_Converted.pdf").exists());
}

#[test]
fn merge_needs_two_pdfs() {
    let dir = tempfile::tempdir().unwrap();
    let only = dir.path().join("only.pdf");
    std::fs::write(&only, b"%PDF-1.5").unwrap();

    carestudio()
        .arg("merge")
        .arg(&only)
        .arg("--out-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("two or more PDF files"));
}

#[test]
fn merge_concatenates_converted_pdfs() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "page.png", 50, 70);

    let first = dir.path().join("first");
    let second = dir.path().join("second");
    for out in [&first, &second] {
        carestudio()
            .arg("jpg2pdf")
            .arg(&image)
            .arg(&image)
            .arg("--out-dir")
            .arg(out)
            .assert()
            .success();
    }

    carestudio()
        .arg("merge")
        .arg(first.join("CareStudio_Converted.pdf"))
        .arg(second.join("CareStudio_Converted.pdf"))
        .arg("--out-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("CareStudio_Merged.pdf"));

    assert!(dir.path().join("CareStudio_Merged.pdf").exists());
}

#[test]
fn offline_scan_writes_scanned_pdf_and_skips_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let page = write_image(dir.path(), "photo.png", 160, 120);
    let bad = dir.path().join("junk.jpg");
    std::fs::write(&bad, b"\xff\xd8 truncated").unwrap();

    carestudio()
        .arg("scan")
        .arg("--offline")
        .arg(&page)
        .arg(&bad)
        .arg("--out-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 pages, 0 auto-cropped"))
        .stderr(predicate::str::contains("Failed to process junk.jpg"));

    assert!(dir.path().join("CareStudio_Scanned.pdf").exists());
}

#[test]
fn scan_with_nothing_usable_fails() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("junk.jpg");
    std::fs::write(&bad, b"junk").unwrap();

    carestudio()
        .arg("scan")
        .arg("--offline")
        .arg(&bad)
        .arg("--out-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No processed images found."));
}

#[test]
fn scan_survives_an_unreachable_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let page = write_image(dir.path(), "photo.png", 90, 60);

    carestudio()
        .arg("scan")
        .arg(&page)
        .arg("--endpoint")
        .arg("http://127.0.0.1:9/api/scan")
        .arg("--out-dir")
        .arg(dir.path())
        .assert()
        .success();

    assert!(dir.path().join("CareStudio_Scanned.pdf").exists());
}

#[test]
fn serve_without_credentials_fails() {
    carestudio()
        .arg("serve")
        .arg("--port")
        .arg("0")
        .env_remove("GOOGLE_CLIENT_EMAIL")
        .env_remove("GOOGLE_PRIVATE_KEY")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOOGLE_CLIENT_EMAIL"));
}

#[test]
fn bad_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("carestudio.json");
    std::fs::write(&config, "{ not json").unwrap();
    let image = write_image(dir.path(), "a.png", 10, 10);

    carestudio()
        .arg("--config")
        .arg(&config)
        .arg("jpg2pdf")
        .arg(&image)
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading config file"));
}
