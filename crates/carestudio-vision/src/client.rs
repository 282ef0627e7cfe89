// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Google Cloud Vision client: service-account token exchange with caching,
// and `images:annotate` with DOCUMENT_TEXT_DETECTION.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use ring::signature::RsaKeyPair;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use carestudio_core::error::{CareStudioError, Result};

use crate::annotator::{BatchAnnotateResponse, PageAnnotator, Vertex};
use crate::credentials::{DEFAULT_TOKEN_URI, ServiceAccount, signed_assertion};

/// Vision API batch annotate endpoint.
pub const DEFAULT_ANNOTATE_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Grant type for exchanging a signed JWT for an access token.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Refresh the cached token this many seconds before it expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    /// Unix seconds.
    expires_at: i64,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        now < self.expires_at - TOKEN_REFRESH_MARGIN_SECS
    }
}

/// Authenticated client for the Vision API.
pub struct VisionClient {
    http: reqwest::Client,
    account: ServiceAccount,
    signing_key: RsaKeyPair,
    token_uri: String,
    annotate_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl VisionClient {
    /// Build a client for `account`. The private key is parsed here, so a
    /// bad key fails immediately rather than on the first request.
    pub fn new(account: ServiceAccount) -> Result<Self> {
        let signing_key = account.signing_key()?;
        info!(client_email = account.client_email(), "Vision client ready");
        Ok(Self {
            http: reqwest::Client::new(),
            account,
            signing_key,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            annotate_url: DEFAULT_ANNOTATE_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Point the client at different token and annotate URLs.
    pub fn with_endpoints(mut self, token_uri: impl Into<String>, annotate_url: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self.annotate_url = annotate_url.into();
        self
    }

    /// A valid access token, from cache when possible.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        let fresh = self.fetch_token(now).await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    #[instrument(skip(self))]
    async fn fetch_token(&self, now: i64) -> Result<CachedToken> {
        let assertion = signed_assertion(
            self.account.client_email(),
            &self.token_uri,
            &self.signing_key,
            now,
        )?;

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| CareStudioError::VisionService(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CareStudioError::Credentials(format!(
                "token exchange rejected ({status}): {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CareStudioError::VisionService(format!("token response unreadable: {e}")))?;

        let expires_in = token.expires_in.unwrap_or(3600);
        debug!(expires_in, "Access token obtained");
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + expires_in,
        })
    }

    /// Run DOCUMENT_TEXT_DETECTION on one image.
    #[instrument(skip(self, image), fields(image_bytes = image.len()))]
    pub async fn annotate(&self, image: &[u8]) -> Result<BatchAnnotateResponse> {
        let access_token = self.access_token().await?;

        let request = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(image) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
            }]
        });

        let response = self
            .http
            .post(&self.annotate_url)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| CareStudioError::VisionService(format!("annotate request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CareStudioError::VisionService(format!(
                "annotate returned {status}: {body}"
            )));
        }

        response
            .json::<BatchAnnotateResponse>()
            .await
            .map_err(|e| CareStudioError::VisionService(format!("annotate response unreadable: {e}")))
    }
}

impl PageAnnotator for VisionClient {
    async fn page_vertices(&self, image: &[u8]) -> Result<Option<Vec<Vertex>>> {
        self.annotate(image).await?.first_block_vertices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use crate::server::{ReadOutcome, read_request};

    const TEST_KEY: &str = include_str!("../testdata/test_service_account_key.pem");

    /// Stand-in for the token and annotate endpoints.
    struct FakeGoogle {
        base: String,
        token_requests: Arc<AtomicUsize>,
    }

    async fn fake_google(annotate_status: u16, annotate_body: &'static str) -> FakeGoogle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let token_requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&token_requests);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let Ok(ReadOutcome::Request(request)) = read_request(&mut stream, 1 << 20).await
                else {
                    continue;
                };

                let (status, body) = match request.path.as_str() {
                    "/token" => {
                        counter.fetch_add(1, Ordering::SeqCst);
                        let form = String::from_utf8_lossy(&request.body).into_owned();
                        assert!(form.contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"));
                        assert!(form.contains("assertion="));
                        (200, r#"{"access_token":"test-token","expires_in":3600}"#)
                    }
                    "/annotate" => {
                        if request.header("authorization") != Some("Bearer test-token") {
                            (401, r#"{"error":"unauthenticated"}"#)
                        } else {
                            (annotate_status, annotate_body)
                        }
                    }
                    _ => (404, "{}"),
                };

                let reply = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes()).await;
            }
        });

        FakeGoogle {
            base,
            token_requests,
        }
    }

    fn client_for(fake: &FakeGoogle) -> VisionClient {
        VisionClient::new(ServiceAccount::new("svc@example.com", TEST_KEY))
            .unwrap()
            .with_endpoints(format!("{}/token", fake.base), format!("{}/annotate", fake.base))
    }

    const ONE_BLOCK: &str = r#"{"responses":[{"fullTextAnnotation":{"pages":[{"blocks":[{"boundingBox":{"vertices":[{"x":1,"y":2},{"x":30,"y":2},{"x":30,"y":40},{"x":1,"y":40}]}}]}]}}]}"#;

    #[tokio::test]
    async fn annotates_and_extracts_vertices() {
        let fake = fake_google(200, ONE_BLOCK).await;
        let client = client_for(&fake);

        let vertices = client.page_vertices(b"jpeg bytes").await.unwrap().unwrap();
        assert_eq!(vertices.len(), 4);
        assert_eq!(vertices[2], Vertex { x: 30, y: 40 });
    }

    #[tokio::test]
    async fn token_is_cached_between_requests() {
        let fake = fake_google(200, ONE_BLOCK).await;
        let client = client_for(&fake);

        client.page_vertices(b"first").await.unwrap();
        client.page_vertices(b"second").await.unwrap();
        assert_eq!(fake.token_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_annotation_is_none() {
        let fake = fake_google(200, r#"{"responses":[{}]}"#).await;
        let client = client_for(&fake);
        assert!(client.page_vertices(b"blank").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn service_error_status_is_an_error() {
        let fake = fake_google(403, r#"{"error":{"message":"API disabled"}}"#).await;
        let client = client_for(&fake);

        let err = client.page_vertices(b"img").await.unwrap_err();
        assert!(matches!(err, CareStudioError::VisionService(_)));
        assert!(err.to_string().contains("API disabled"));
    }

    #[test]
    fn bad_key_fails_at_construction() {
        let result = VisionClient::new(ServiceAccount::new("svc@example.com", "garbage"));
        assert!(matches!(result, Err(CareStudioError::Credentials(_))));
    }

    #[test]
    fn cached_token_refreshes_a_minute_early() {
        let token = CachedToken {
            access_token: "t".into(),
            expires_at: 1_000,
        };
        assert!(token.is_fresh(900));
        assert!(!token.is_fresh(940));
        assert!(!token.is_fresh(1_000));
    }
}
