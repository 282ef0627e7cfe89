// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CareStudio: Core types, configuration and error definitions shared across
// all crates.

pub mod alerts;
pub mod config;
pub mod detect;
pub mod error;
pub mod integrity;
pub mod types;

pub use config::AppConfig;
pub use detect::{CornerDetector, NoDetection};
pub use error::CareStudioError;
pub use types::*;
