// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Resolution order: built-in defaults, then an optional JSON file, then
// `CARESTUDIO_*` environment variables. Command-line flags are applied on top
// by the binary.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CareStudioError, Result};

/// Runtime settings for the tools and the detection server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the detection server binds to.
    pub bind_address: String,
    /// Port for the detection server.
    pub server_port: u16,
    /// URL the scanner posts images to for corner detection.
    pub scan_endpoint: String,
    /// How many files of a scan batch may be in flight at once (1 = sequential).
    pub detection_concurrency: usize,
    /// Largest request body the detection server accepts.
    pub max_request_bytes: usize,
    /// JPEG quality for corrected scan pages.
    pub scan_jpeg_quality: u8,
    /// JPEG quality for rendered PDF pages.
    pub render_jpeg_quality: u8,
    /// Upscaling factor applied when rendering PDF pages.
    pub render_scale: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            server_port: 3000,
            scan_endpoint: "http://127.0.0.1:3000/api/scan".into(),
            detection_concurrency: 1,
            max_request_bytes: 20 * 1024 * 1024,
            scan_jpeg_quality: 100,
            render_jpeg_quality: 90,
            render_scale: 1.5,
        }
    }
}

impl AppConfig {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        debug!(path = %path.as_ref().display(), "config file loaded");
        Ok(config)
    }

    /// Overlay `CARESTUDIO_*` variables from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay settings from an arbitrary key lookup.
    ///
    /// Unparseable numeric values are rejected rather than silently ignored.
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(bind) = lookup("CARESTUDIO_BIND") {
            self.bind_address = bind;
        }
        if let Some(port) = lookup("CARESTUDIO_PORT") {
            self.server_port = parse_var("CARESTUDIO_PORT", &port)?;
        }
        if let Some(endpoint) = lookup("CARESTUDIO_SCAN_ENDPOINT") {
            self.scan_endpoint = endpoint;
        }
        if let Some(limit) = lookup("CARESTUDIO_DETECTION_CONCURRENCY") {
            self.detection_concurrency = parse_var("CARESTUDIO_DETECTION_CONCURRENCY", &limit)?;
        }
        self.validate()
    }

    /// Clamp or reject values the tools cannot work with.
    pub fn validate(mut self) -> Result<Self> {
        if self.detection_concurrency == 0 {
            warn!("detection_concurrency of 0 raised to 1");
            self.detection_concurrency = 1;
        }
        for (name, quality) in [
            ("scan_jpeg_quality", self.scan_jpeg_quality),
            ("render_jpeg_quality", self.render_jpeg_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(CareStudioError::InvalidInput(format!(
                    "{name} must be between 1 and 100, got {quality}"
                )));
            }
        }
        if !(self.render_scale.is_finite() && self.render_scale > 0.0) {
            return Err(CareStudioError::InvalidInput(format!(
                "render_scale must be positive, got {}",
                self.render_scale
            )));
        }
        Ok(self)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CareStudioError::InvalidInput(format!("{key} has an invalid value: {value:?}"))
    })
}
