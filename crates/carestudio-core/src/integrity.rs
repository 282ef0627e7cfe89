// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SHA-256 fingerprints for input files, used to correlate log lines and batch
// reports without logging file contents.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// First 12 hex digits of [`hash_bytes`], enough to tell files apart in logs.
pub fn short_digest(data: &[u8]) -> String {
    let mut digest = hash_bytes(data);
    digest.truncate(12);
    digest
}
