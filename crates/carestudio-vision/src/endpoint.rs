// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `POST /api/scan` request handling, independent of the transport.
//
// The handler is stateless: it validates the JSON body, decodes the base64
// image, asks the annotator for the page polygon and maps the outcome to a
// status code and JSON body.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::annotator::PageAnnotator;

/// The only routed path.
pub const SCAN_PATH: &str = "/api/scan";

pub const MSG_NO_IMAGE: &str = "No image provided.";
pub const MSG_INVALID_BASE64: &str = "Image is not valid base64.";
pub const MSG_NO_PAGE: &str = "No document page found by AI.";
pub const MSG_NOT_FOUND: &str = "Not found.";
pub const MSG_TOO_LARGE: &str = "Request body too large.";
pub const MSG_MALFORMED: &str = "Malformed HTTP request.";

/// A status code plus JSON body, ready to be written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    pub status: u16,
    pub body: Value,
}

impl JsonResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// `{"error": message}`: the request was rejected before any processing.
    pub fn rejected(status: u16, message: &str) -> Self {
        Self::new(status, json!({ "error": message }))
    }

    /// `{"success": false, "error": message}`: processing failed.
    pub fn failed(status: u16, message: &str) -> Self {
        Self::new(status, json!({ "success": false, "error": message }))
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            413 => "Payload Too Large",
            _ => "Internal Server Error",
        }
    }
}

/// Route and handle one request.
pub async fn handle_request<A>(method: &str, path: &str, body: &[u8], annotator: &A) -> JsonResponse
where
    A: PageAnnotator + Sync,
{
    let route = path.split('?').next().unwrap_or(path);
    if route != SCAN_PATH {
        debug!(path, "Unknown path");
        return JsonResponse::rejected(404, MSG_NOT_FOUND);
    }

    if !method.eq_ignore_ascii_case("POST") {
        warn!(method, "Scan request with wrong method");
        return JsonResponse::rejected(400, MSG_NO_IMAGE);
    }

    let image = match decode_image_field(body) {
        Ok(image) => image,
        Err(rejection) => return rejection,
    };

    info!(image_bytes = image.len(), "Requesting page annotation");
    match annotator.page_vertices(&image).await {
        Ok(Some(vertices)) => {
            info!(vertices = vertices.len(), "Page polygon found");
            JsonResponse::new(200, json!({ "success": true, "corners": vertices }))
        }
        Ok(None) => {
            info!("No page polygon in annotation");
            JsonResponse::failed(404, MSG_NO_PAGE)
        }
        Err(err) => {
            error!(error = %err, "Page annotation failed");
            JsonResponse::failed(500, &err.to_string())
        }
    }
}

/// Pull the `image` field out of a JSON body and base64-decode it. A
/// `data:...;base64,` prefix is tolerated.
pub fn decode_image_field(body: &[u8]) -> Result<Vec<u8>, JsonResponse> {
    let parsed: Value =
        serde_json::from_slice(body).map_err(|_| JsonResponse::rejected(400, MSG_NO_IMAGE))?;

    let encoded = parsed
        .get("image")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| JsonResponse::rejected(400, MSG_NO_IMAGE))?;

    let payload = match encoded.find(";base64,") {
        Some(offset) if encoded.starts_with("data:") => &encoded[offset + ";base64,".len()..],
        _ => encoded,
    };

    let image = STANDARD
        .decode(payload)
        .map_err(|_| JsonResponse::rejected(400, MSG_INVALID_BASE64))?;
    if image.is_empty() {
        return Err(JsonResponse::rejected(400, MSG_NO_IMAGE));
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotator::Vertex;
    use carestudio_core::error::{CareStudioError, Result};

    /// Annotator returning a canned outcome.
    enum Canned {
        Found,
        Nothing,
        Broken,
    }

    impl PageAnnotator for Canned {
        async fn page_vertices(&self, _image: &[u8]) -> Result<Option<Vec<Vertex>>> {
            match self {
                Canned::Found => Ok(Some(vec![
                    Vertex { x: 10, y: 12 },
                    Vertex { x: 300, y: 8 },
                    Vertex { x: 310, y: 420 },
                    Vertex { x: 0, y: 415 },
                ])),
                Canned::Nothing => Ok(None),
                Canned::Broken => Err(CareStudioError::VisionService("quota exceeded".into())),
            }
        }
    }

    fn body(image: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({ "image": image })).unwrap()
    }

    const PNG_B64: &str = "iVBORw0KGgo=";

    #[tokio::test]
    async fn found_page_returns_corners() {
        let response = handle_request("POST", SCAN_PATH, &body(PNG_B64), &Canned::Found).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["success"], true);
        assert_eq!(response.body["corners"][1], json!({ "x": 300, "y": 8 }));
        assert_eq!(response.body["corners"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn no_page_is_404_not_200() {
        let response = handle_request("POST", SCAN_PATH, &body(PNG_B64), &Canned::Nothing).await;
        assert_eq!(response.status, 404);
        assert_eq!(
            response.body,
            json!({ "success": false, "error": "No document page found by AI." })
        );
    }

    #[tokio::test]
    async fn service_failure_is_500_with_message() {
        let response = handle_request("POST", SCAN_PATH, &body(PNG_B64), &Canned::Broken).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body["success"], false);
        assert!(response.body["error"].as_str().unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn missing_image_is_400() {
        let payloads: [&[u8]; 5] = [b"{}", br#"{"image":""}"#, br#"{"image":42}"#, b"not json", b""];
        for payload in payloads {
            let response = handle_request("POST", SCAN_PATH, payload, &Canned::Found).await;
            assert_eq!(response.status, 400);
            assert_eq!(response.body, json!({ "error": "No image provided." }));
        }
    }

    #[tokio::test]
    async fn wrong_method_is_400() {
        let response = handle_request("GET", SCAN_PATH, &body(PNG_B64), &Canned::Found).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], MSG_NO_IMAGE);
    }

    #[tokio::test]
    async fn bad_base64_is_400() {
        let response = handle_request("POST", SCAN_PATH, &body("@@not base64@@"), &Canned::Found).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], MSG_INVALID_BASE64);
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let response = handle_request("POST", "/api/other", &body(PNG_B64), &Canned::Found).await;
        assert_eq!(response, JsonResponse::rejected(404, MSG_NOT_FOUND));
    }

    #[tokio::test]
    async fn query_string_is_ignored() {
        let response =
            handle_request("POST", "/api/scan?v=2", &body(PNG_B64), &Canned::Found).await;
        assert_eq!(response.status, 200);
    }

    #[test]
    fn data_url_prefix_is_accepted() {
        let image = decode_image_field(&body("data:image/png;base64,iVBORw0KGgo=")).unwrap();
        assert_eq!(&image[1..4], b"PNG");
    }
}
