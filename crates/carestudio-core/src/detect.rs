// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner detection seam between the scan orchestrator and whatever finds
// document corners (the remote endpoint, an offline stub, a test double).

use std::future::Future;

use crate::types::CornerSet;

/// Finds the four corners of a document page in an encoded image.
///
/// Detection is best-effort: implementations return `None` for every kind of
/// failure (network, bad status, malformed payload, nothing found) so that
/// callers always proceed with the fallback path instead of failing.
pub trait CornerDetector {
    fn detect(&self, image: &[u8]) -> impl Future<Output = Option<CornerSet>> + Send;
}

/// A detector that never finds anything. Every page takes the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetection;

impl CornerDetector for NoDetection {
    async fn detect(&self, _image: &[u8]) -> Option<CornerSet> {
        None
    }
}
