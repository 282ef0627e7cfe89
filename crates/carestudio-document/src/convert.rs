// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-document conversions: images to PDF, PDF merge, PDF pages to JPEG.
//
// Each conversion either produces all of its output or fails as a whole;
// nothing is written for a partially processed input.

use tracing::{info, instrument};

use carestudio_core::error::{CareStudioError, Result};
use carestudio_core::types::{SourceFile, output_names};

use crate::image::processor::encode_jpeg;
use crate::pdf::reader::merge_documents;
use crate::pdf::render::PageRasterizer;
use crate::pdf::writer::PdfWriter;

/// A generated file, ready to be saved under `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Build `CareStudio_Converted.pdf` with one A4 page per image.
///
/// Every image is decoded before the document is built; the first one that
/// fails to decode aborts the conversion and is named in the error.
#[instrument(skip_all, fields(images = images.len()))]
pub fn jpg_to_pdf(images: &[SourceFile]) -> Result<OutputFile> {
    if images.is_empty() {
        return Err(CareStudioError::NoInput(
            "please select one or more image files.".into(),
        ));
    }

    let decoded = images
        .iter()
        .map(|source| {
            ::image::load_from_memory(&source.bytes).map_err(|err| {
                CareStudioError::ImageError(format!("failed to decode {}: {}", source.name, err))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut writer = PdfWriter::a4();
    writer.set_title("CareStudio Converted");
    let bytes = writer.create_from_images(&decoded)?;

    info!(pages = decoded.len(), "Images converted to PDF");
    Ok(OutputFile::new(output_names::CONVERTED_PDF, bytes))
}

/// Build `CareStudio_Merged.pdf` from two or more PDFs, in the order given.
#[instrument(skip_all, fields(documents = documents.len()))]
pub fn merge_pdfs(documents: &[SourceFile]) -> Result<OutputFile> {
    let bytes = merge_documents(documents)?;
    Ok(OutputFile::new(output_names::MERGED_PDF, bytes))
}

/// Render every page of `pdf` and encode each as a JPEG named
/// `<stem>_page_<n>.jpg`, numbered from 1.
#[instrument(skip_all, fields(file = %pdf.name, scale, quality))]
pub fn pdf_to_jpg<R: PageRasterizer + ?Sized>(
    pdf: &SourceFile,
    rasterizer: &R,
    scale: f32,
    quality: u8,
) -> Result<Vec<OutputFile>> {
    let pages = rasterizer.rasterize(&pdf.bytes, scale)?;

    let outputs = pages
        .iter()
        .enumerate()
        .map(|(index, page)| {
            let jpeg = encode_jpeg(page, quality)?;
            Ok(OutputFile::new(
                output_names::page_image(&pdf.name, index + 1),
                jpeg,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    info!(pages = outputs.len(), "PDF pages exported as JPEG");
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn image_file(name: &str, width: u32, height: u32, format: ImageFormat) -> SourceFile {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 40])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        SourceFile::new(name, buf)
    }

    /// Renders a fixed number of blank pages whatever the input.
    struct FakeRasterizer {
        pages: usize,
    }

    impl PageRasterizer for FakeRasterizer {
        fn rasterize(&self, _pdf: &[u8], scale: f32) -> Result<Vec<DynamicImage>> {
            let (w, h) = ((100.0 * scale) as u32, (140.0 * scale) as u32);
            Ok((0..self.pages)
                .map(|_| DynamicImage::ImageRgb8(RgbImage::new(w, h)))
                .collect())
        }
    }

    struct BrokenRasterizer;

    impl PageRasterizer for BrokenRasterizer {
        fn rasterize(&self, _pdf: &[u8], _scale: f32) -> Result<Vec<DynamicImage>> {
            Err(CareStudioError::PdfError("not a PDF".into()))
        }
    }

    #[test]
    fn three_images_make_three_pages() {
        let images = vec![
            image_file("a.jpg", 60, 40, ImageFormat::Jpeg),
            image_file("b.png", 40, 60, ImageFormat::Png),
            image_file("c.jpg", 30, 30, ImageFormat::Jpeg),
        ];
        let output = jpg_to_pdf(&images).unwrap();

        assert_eq!(output.name, "CareStudio_Converted.pdf");
        let reader = crate::PdfReader::from_bytes(&output.bytes).unwrap();
        assert_eq!(reader.page_count(), 3);
    }

    #[test]
    fn one_bad_image_aborts_and_is_named() {
        let images = vec![
            image_file("good.jpg", 20, 20, ImageFormat::Jpeg),
            SourceFile::new("corrupt.jpg", vec![0xFF, 0xD8, 0x00]),
        ];
        let err = jpg_to_pdf(&images).unwrap_err();
        assert!(err.to_string().contains("corrupt.jpg"));
    }

    #[test]
    fn no_images_is_an_input_error() {
        assert!(matches!(jpg_to_pdf(&[]), Err(CareStudioError::NoInput(_))));
    }

    #[test]
    fn merge_output_is_named() {
        let pdf = jpg_to_pdf(&[image_file("a.jpg", 20, 20, ImageFormat::Jpeg)]).unwrap();
        let sources = vec![
            SourceFile::new("one.pdf", pdf.bytes.clone()),
            SourceFile::new("two.pdf", pdf.bytes),
        ];
        let merged = merge_pdfs(&sources).unwrap();
        assert_eq!(merged.name, "CareStudio_Merged.pdf");
        let reader = crate::PdfReader::from_bytes(&merged.bytes).unwrap();
        assert_eq!(reader.page_count(), 2);
    }

    #[test]
    fn pdf_pages_are_numbered_from_one() {
        let pdf = SourceFile::new("report.pdf", b"%PDF".to_vec());
        let outputs = pdf_to_jpg(&pdf, &FakeRasterizer { pages: 3 }, 1.5, 90).unwrap();

        let names: Vec<&str> = outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["report_page_1.jpg", "report_page_2.jpg", "report_page_3.jpg"]
        );

        let first = ::image::load_from_memory(&outputs[0].bytes).unwrap();
        assert_eq!((first.width(), first.height()), (150, 210));
    }

    #[test]
    fn pdf_to_jpg_fails_as_a_whole() {
        let pdf = SourceFile::new("broken.pdf", Vec::new());
        assert!(pdf_to_jpg(&pdf, &BrokenRasterizer, 1.5, 90).is_err());
    }
}
