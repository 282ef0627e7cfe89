// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: creating PDFs from images, merging, and rendering pages.

pub mod reader;
pub mod render;
pub mod writer;

pub use reader::PdfReader;
pub use writer::PdfWriter;
