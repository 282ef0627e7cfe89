// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the carestudio-document scan pipeline: both
// rectification paths followed by binarization and sharpening, on a
// synthetic photographed page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};

use carestudio_core::types::{CornerSet, Point};
use carestudio_document::scan::correct::{ADAPTIVE_BLOCK_SIZE, ADAPTIVE_OFFSET};
use carestudio_document::{Rectification, ScanCorrector};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// 640x480 dark background with a light, slightly skewed page on it.
fn photographed_page() -> (DynamicImage, CornerSet) {
    let mut img = RgbImage::from_pixel(640, 480, Rgb([35, 35, 35]));
    for y in 60..420 {
        for x in 120..520 {
            img.put_pixel(x, y, Rgb([235, 235, 230]));
        }
    }
    let corners = CornerSet::new([
        Point::new(118.0, 62.0),
        Point::new(522.0, 58.0),
        Point::new(519.0, 421.0),
        Point::new(121.0, 418.0),
    ]);
    (DynamicImage::ImageRgb8(img), corners)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_rectify(c: &mut Criterion) {
    let (page, corners) = photographed_page();

    c.bench_function("rectify detected (640x480 -> 900x1273)", |b| {
        b.iter(|| {
            let corrector = ScanCorrector::from_dynamic(black_box(page.clone()));
            let (out, _) = corrector.rectify(Rectification::Detected(corners));
            black_box(out.into_dynamic());
        });
    });

    c.bench_function("rectify fallback (640x480 -> 900x1273)", |b| {
        b.iter(|| {
            let corrector = ScanCorrector::from_dynamic(black_box(page.clone()));
            let (out, _) = corrector.rectify(Rectification::Fallback);
            black_box(out.into_dynamic());
        });
    });
}

/// Enhancement on a full-size canvas, the hot path of every scanned page.
fn bench_enhance(c: &mut Criterion) {
    let (page, _) = photographed_page();
    let (canvas, _) = ScanCorrector::from_dynamic(page).rectify(Rectification::Fallback);
    let canvas = canvas.into_dynamic();

    c.bench_function("binarize + sharpen (900x1273)", |b| {
        b.iter(|| {
            let out = ScanCorrector::from_dynamic(black_box(canvas.clone()))
                .binarize_gaussian(ADAPTIVE_BLOCK_SIZE, ADAPTIVE_OFFSET)
                .sharpen();
            black_box(out.into_dynamic());
        });
    });
}

criterion_group!(benches, bench_rectify, bench_enhance);
criterion_main!(benches);
