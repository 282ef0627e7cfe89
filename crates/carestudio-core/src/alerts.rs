// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// User-facing alert messages.
//
// Every error that reaches the user is turned into a short plain-English
// message plus a suggestion. Detection problems never get here: they degrade
// to the fallback path and are only logged.

use std::fmt;

use crate::error::CareStudioError;

/// A message the front end shows instead of a raw error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// One-line summary.
    pub message: String,
    /// What the user should try next.
    pub suggestion: String,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.message, self.suggestion)
    }
}

/// Alert for one file of a batch that could not be processed.
pub fn file_failed(file_name: &str, err: &CareStudioError) -> Alert {
    Alert {
        message: format!("Failed to process {file_name}"),
        suggestion: alert_for(err).suggestion,
    }
}

/// Convert a `CareStudioError` into an [`Alert`].
pub fn alert_for(err: &CareStudioError) -> Alert {
    match err {
        CareStudioError::NoInput(detail) => Alert {
            message: capitalise(detail),
            suggestion: "Select one or more files and try again.".into(),
        },

        CareStudioError::InvalidInput(detail) => Alert {
            message: capitalise(detail),
            suggestion: "Check the selected files and options, then try again.".into(),
        },

        CareStudioError::ImageError(_) => Alert {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
        },

        CareStudioError::PdfError(_) | CareStudioError::RenderError(_) => Alert {
            message: "Error: Could not process the PDF file.".into(),
            suggestion: "The file may be damaged or password protected. Try opening it in a PDF viewer first.".into(),
        },

        CareStudioError::Detection(_) | CareStudioError::VisionService(_) => Alert {
            message: "Automatic page detection is unavailable.".into(),
            suggestion: "The page will be scanned without cropping. Try again later for automatic cropping.".into(),
        },

        CareStudioError::Credentials(_) => Alert {
            message: "The detection service is not configured.".into(),
            suggestion: "Set GOOGLE_CLIENT_EMAIL and GOOGLE_PRIVATE_KEY for the server process.".into(),
        },

        CareStudioError::Server(detail) => Alert {
            message: "The detection server had a problem.".into(),
            suggestion: format!("Check the address and port are free, then restart it. ({detail})"),
        },

        CareStudioError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => Alert {
                message: "The file couldn't be found.".into(),
                suggestion: "It may have been moved or deleted. Check the path and try again.".into(),
            },
            std::io::ErrorKind::PermissionDenied => Alert {
                message: "Permission denied while reading or writing a file.".into(),
                suggestion: "Check the file permissions or choose a different output folder.".into(),
            },
            _ => Alert {
                message: "There was a problem reading or writing a file.".into(),
                suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
            },
        },

        CareStudioError::Serialization(_) => Alert {
            message: "A settings or response file could not be read.".into(),
            suggestion: "Check that the file is valid JSON.".into(),
        },
    }
}

fn capitalise(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
