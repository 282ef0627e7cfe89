// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner detection over HTTP: posts the image to a detection endpoint and
// turns a successful reply into a canonical `CornerSet`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use carestudio_core::detect::CornerDetector;
use carestudio_core::types::{CornerSet, Point};

#[derive(Debug, Deserialize)]
struct DetectionReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    corners: Option<Vec<WirePoint>>,
}

/// Endpoint vertices may omit zero coordinates.
#[derive(Debug, Deserialize)]
struct WirePoint {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
}

/// [`CornerDetector`] that calls a `POST /api/scan` style endpoint.
#[derive(Debug, Clone)]
pub struct HttpCornerDetector {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpCornerDetector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CornerDetector for HttpCornerDetector {
    #[instrument(skip(self, image), fields(endpoint = %self.endpoint, image_bytes = image.len()))]
    async fn detect(&self, image: &[u8]) -> Option<CornerSet> {
        let request = json!({ "image": STANDARD.encode(image) });

        let response = match self.http.post(&self.endpoint).json(&request).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Corner detection unreachable; using fallback");
                return None;
            }
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => interpret_detection_reply(status, &body),
            Err(err) => {
                warn!(status, error = %err, "Corner detection reply unreadable; using fallback");
                None
            }
        }
    }
}

/// Decide whether a detection reply carries a usable corner set.
///
/// Anything other than a 2xx status with `success: true` and exactly four
/// corners is "not found".
pub fn interpret_detection_reply(status: u16, body: &[u8]) -> Option<CornerSet> {
    if !(200..300).contains(&status) {
        warn!(status, "Corner detection returned an error status; using fallback");
        return None;
    }

    let reply: DetectionReply = match serde_json::from_slice(body) {
        Ok(reply) => reply,
        Err(err) => {
            warn!(error = %err, "Corner detection reply is not JSON; using fallback");
            return None;
        }
    };

    if !reply.success {
        warn!("Corner detection reported no success; using fallback");
        return None;
    }

    let points: Vec<Point> = reply
        .corners
        .unwrap_or_default()
        .into_iter()
        .map(|p| Point::new(p.x, p.y))
        .collect();

    match CornerSet::from_points(&points) {
        Ok(corners) => {
            debug!(corners = ?corners.points(), "Corners detected");
            Some(corners)
        }
        Err(err) => {
            warn!(error = %err, "Unusable corner list; using fallback");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carestudio_core::config::AppConfig;

    use crate::annotator::{PageAnnotator, Vertex};
    use crate::server::DetectionServer;

    const FOUR: &[u8] =
        br#"{"success":true,"corners":[{"x":300,"y":10},{"x":10,"y":12},{"x":12,"y":400},{"x":305,"y":390}]}"#;

    #[test]
    fn four_corners_are_canonically_ordered() {
        let corners = interpret_detection_reply(200, FOUR).unwrap();
        assert_eq!(corners.points()[0], Point::new(10.0, 12.0));
        assert_eq!(corners.points()[2], Point::new(305.0, 390.0));
    }

    #[test]
    fn omitted_coordinates_default_to_zero() {
        let body = br#"{"success":true,"corners":[{"y":0},{"x":50},{"x":50,"y":80},{"y":80}]}"#;
        let corners = interpret_detection_reply(200, body).unwrap();
        assert_eq!(corners.points()[0], Point::new(0.0, 0.0));
    }

    #[test]
    fn failures_are_not_found() {
        assert!(interpret_detection_reply(500, FOUR).is_none());
        assert!(interpret_detection_reply(404, br#"{"success":false}"#).is_none());
        assert!(interpret_detection_reply(200, b"<html>").is_none());
        assert!(interpret_detection_reply(200, br#"{"success":false,"corners":[]}"#).is_none());
        assert!(interpret_detection_reply(200, br#"{"success":true}"#).is_none());
        assert!(
            interpret_detection_reply(200, br#"{"success":true,"corners":[{"x":1,"y":1},{"x":2,"y":2},{"x":3,"y":3}]}"#)
                .is_none()
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_not_found() {
        // Port 9 (discard) on localhost is not expected to run an HTTP server.
        let detector = HttpCornerDetector::new("http://127.0.0.1:9/api/scan");
        assert!(detector.detect(b"img").await.is_none());
    }

    /// Annotator that echoes a rectangle or nothing, depending on input size.
    struct SizeAnnotator;

    impl PageAnnotator for SizeAnnotator {
        async fn page_vertices(
            &self,
            image: &[u8],
        ) -> carestudio_core::error::Result<Option<Vec<Vertex>>> {
            if image.len() < 4 {
                return Ok(None);
            }
            Ok(Some(vec![
                Vertex { x: 20, y: 0 },
                Vertex { x: 20, y: 30 },
                Vertex { x: 0, y: 30 },
                Vertex { x: 0, y: 0 },
            ]))
        }
    }

    #[tokio::test]
    async fn round_trip_through_detection_server() {
        let config = AppConfig {
            server_port: 0,
            ..AppConfig::default()
        };
        let mut server = DetectionServer::new(SizeAnnotator, &config);
        let addr = server.start().await.unwrap();
        let detector = HttpCornerDetector::new(format!("http://{addr}/api/scan"));

        let corners = detector.detect(b"four or more bytes").await.unwrap();
        assert_eq!(corners.points()[0], Point::new(0.0, 0.0));
        assert_eq!(corners.points()[1], Point::new(20.0, 0.0));

        // 404 from the endpoint degrades to "not found".
        assert!(detector.detect(b"abc").await.is_none());

        server.stop().await.unwrap();
    }
}
