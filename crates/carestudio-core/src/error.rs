// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for CareStudio.

use thiserror::Error;

/// Top-level error type for all CareStudio operations.
#[derive(Debug, Error)]
pub enum CareStudioError {
    // -- Input validation --
    #[error("no input: {0}")]
    NoInput(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // -- Document errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("page rendering failed: {0}")]
    RenderError(String),

    // -- Detection --
    #[error("corner detection failed: {0}")]
    Detection(String),

    #[error("service account credentials invalid: {0}")]
    Credentials(String),

    #[error("vision service error: {0}")]
    VisionService(String),

    #[error("detection server error: {0}")]
    Server(String),

    // -- Storage / serialization --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CareStudioError>;
