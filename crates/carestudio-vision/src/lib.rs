// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CareStudio Vision: the `POST /api/scan` page-detection endpoint backed by
// Google Cloud Vision, plus the HTTP client side used by the scanner to ask
// that endpoint for document corners.

pub mod annotator;
pub mod client;
pub mod credentials;
pub mod detector;
pub mod endpoint;
pub mod server;

pub use annotator::{PageAnnotator, Vertex};
pub use client::VisionClient;
pub use credentials::ServiceAccount;
pub use detector::HttpCornerDetector;
pub use server::DetectionServer;
