// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline: per-image correction and batch orchestration.

pub mod batch;
pub mod correct;

pub use batch::{ScanBatch, run_batch};
pub use correct::{ScanCorrector, correct_scan};
