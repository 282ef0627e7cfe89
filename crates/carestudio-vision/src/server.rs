// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded HTTP server for the page-detection endpoint.
//
// The server operates directly on raw TCP: it parses HTTP/1.1 framing just
// enough to get the method, path and a Content-Length or chunked body, hands
// them to `endpoint::handle_request`, and writes back a JSON response with
// `Connection: close`. One request per connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use carestudio_core::config::AppConfig;
use carestudio_core::error::{CareStudioError, Result};

use crate::annotator::PageAnnotator;
use crate::endpoint::{self, JsonResponse, MSG_MALFORMED, MSG_TOO_LARGE};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on the request line plus headers.
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Read buffer size per `read` call.
const READ_CHUNK: usize = 8192;

/// Upper bound on a chunk-size or trailer line.
const MAX_CHUNK_LINE_BYTES: usize = 1024;

// ---------------------------------------------------------------------------
// Minimal HTTP request parser
// ---------------------------------------------------------------------------

/// A parsed HTTP request.
#[derive(Debug)]
pub(crate) struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// What came off the socket.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    Request(HttpRequest),
    /// Declared or accumulated body exceeds the limit.
    TooLarge,
    Malformed,
    /// Peer closed the connection without sending anything.
    Closed,
}

/// A body read to completion, or the reason it could not be.
enum BodyOutcome {
    Complete(Vec<u8>),
    TooLarge,
    Malformed,
}

/// Read one request: headers up to the blank line, then the body, framed by
/// `Transfer-Encoding: chunked` or else by Content-Length (0 if absent).
///
/// A client that sent `Expect: 100-continue` gets the interim `100 Continue`
/// before the body is read.
pub(crate) async fn read_request<S>(stream: &mut S, max_body: usize) -> std::io::Result<ReadOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    let header_end = loop {
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Ok(ReadOutcome::Malformed);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(if buf.is_empty() {
                ReadOutcome::Closed
            } else {
                ReadOutcome::Malformed
            });
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Ok(ReadOutcome::Malformed);
    };
    if !version.starts_with("HTTP/") {
        return Ok(ReadOutcome::Malformed);
    }

    let mut headers = Vec::new();
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            return Ok(ReadOutcome::Malformed);
        };
        headers.push((key.trim().to_string(), value.trim().to_string()));
    }

    // Transfer-Encoding takes precedence over Content-Length; chunked must
    // be the final coding.
    let chunked = match find_header(&headers, "transfer-encoding") {
        Some(codings) => {
            let last = codings.rsplit(',').next().map(str::trim).unwrap_or_default();
            if !last.eq_ignore_ascii_case("chunked") {
                return Ok(ReadOutcome::Malformed);
            }
            true
        }
        None => false,
    };

    let content_length = if chunked {
        0
    } else {
        match find_header(&headers, "content-length") {
            Some(value) => match value.parse::<usize>() {
                Ok(length) => length,
                Err(_) => return Ok(ReadOutcome::Malformed),
            },
            None => 0,
        }
    };

    if content_length > max_body {
        return Ok(ReadOutcome::TooLarge);
    }

    let expects_continue = find_header(&headers, "expect")
        .is_some_and(|value| value.eq_ignore_ascii_case("100-continue"));
    if expects_continue && (chunked || content_length > 0) {
        stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
        stream.flush().await?;
    }

    let pending = buf.split_off(header_end + 4);
    let outcome = if chunked {
        read_chunked_body(stream, pending, max_body).await?
    } else {
        read_sized_body(stream, pending, content_length).await?
    };

    let body = match outcome {
        BodyOutcome::Complete(body) => body,
        BodyOutcome::TooLarge => return Ok(ReadOutcome::TooLarge),
        BodyOutcome::Malformed => return Ok(ReadOutcome::Malformed),
    };

    Ok(ReadOutcome::Request(HttpRequest {
        method: method.to_string(),
        path: path.to_string(),
        headers,
        body,
    }))
}

/// Exactly `length` bytes; bytes past it are ignored.
async fn read_sized_body<R>(reader: &mut R, mut pending: Vec<u8>, length: usize) -> std::io::Result<BodyOutcome>
where
    R: AsyncRead + Unpin,
{
    if !fill_to(reader, &mut pending, length).await? {
        return Ok(BodyOutcome::Malformed);
    }
    pending.truncate(length);
    Ok(BodyOutcome::Complete(pending))
}

/// Decode a chunked body: `<hex size>[;ext]\r\n<data>\r\n` repeated, ended by
/// a zero-size chunk and optional trailer lines.
async fn read_chunked_body<R>(reader: &mut R, mut pending: Vec<u8>, max_body: usize) -> std::io::Result<BodyOutcome>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::new();

    loop {
        let Some(line_end) = fill_line(reader, &mut pending).await? else {
            return Ok(BodyOutcome::Malformed);
        };
        let Some(size) = parse_chunk_size(&pending[..line_end]) else {
            return Ok(BodyOutcome::Malformed);
        };
        pending.drain(..line_end + 2);

        if size == 0 {
            // Trailers are read and discarded up to the blank line.
            loop {
                let Some(end) = fill_line(reader, &mut pending).await? else {
                    return Ok(BodyOutcome::Malformed);
                };
                pending.drain(..end + 2);
                if end == 0 {
                    return Ok(BodyOutcome::Complete(body));
                }
            }
        }

        if size > max_body.saturating_sub(body.len()) {
            return Ok(BodyOutcome::TooLarge);
        }
        if !fill_to(reader, &mut pending, size + 2).await? || &pending[size..size + 2] != b"\r\n" {
            return Ok(BodyOutcome::Malformed);
        }
        body.extend_from_slice(&pending[..size]);
        pending.drain(..size + 2);
    }
}

fn parse_chunk_size(line: &[u8]) -> Option<usize> {
    let line = std::str::from_utf8(line).ok()?;
    let size = line.split(';').next()?.trim();
    usize::from_str_radix(size, 16).ok()
}

/// Read until `pending` holds at least `len` bytes. `false` on EOF.
async fn fill_to<R>(reader: &mut R, pending: &mut Vec<u8>, len: usize) -> std::io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    while pending.len() < len {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(false);
        }
        pending.extend_from_slice(&chunk[..n]);
    }
    Ok(true)
}

/// Read until `pending` contains a CRLF and return its offset. `None` on EOF
/// or when the line grows past [`MAX_CHUNK_LINE_BYTES`].
async fn fill_line<R>(reader: &mut R, pending: &mut Vec<u8>) -> std::io::Result<Option<usize>>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(pos) = find_subsequence(pending, b"\r\n") {
            return Ok(Some(pos));
        }
        if pending.len() > MAX_CHUNK_LINE_BYTES {
            return Ok(None);
        }
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        pending.extend_from_slice(&chunk[..n]);
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Find the first occurrence of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Write a JSON response with minimal HTTP/1.1 framing.
async fn send_response(stream: &mut TcpStream, response: &JsonResponse) -> Result<()> {
    let body = serde_json::to_vec(&response.body)?;
    let head = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        response.status,
        response.reason_phrase(),
        body.len()
    );

    stream
        .write_all(head.as_bytes())
        .await
        .map_err(|e| CareStudioError::Server(format!("write HTTP headers: {e}")))?;
    stream
        .write_all(&body)
        .await
        .map_err(|e| CareStudioError::Server(format!("write JSON body: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| CareStudioError::Server(format!("flush: {e}")))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Shared state passed to connection handlers
// ---------------------------------------------------------------------------

struct SharedState<A> {
    annotator: Arc<A>,
    active_connections: Arc<AtomicU32>,
    max_request_bytes: usize,
}

// ---------------------------------------------------------------------------
// DetectionServer
// ---------------------------------------------------------------------------

/// HTTP server exposing `POST /api/scan`.
pub struct DetectionServer<A> {
    /// Address to bind, e.g. `127.0.0.1`.
    bind_address: String,
    /// Requested port; 0 picks a free one.
    port: u16,
    max_request_bytes: usize,
    annotator: Arc<A>,
    /// Notification handle used to signal a graceful shutdown.
    shutdown_signal: Arc<Notify>,
    /// Handle to the Tokio task running the accept loop.
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
    /// The address actually bound, once started.
    local_addr: Option<SocketAddr>,
}

impl<A> DetectionServer<A>
where
    A: PageAnnotator + Send + Sync + 'static,
{
    /// Create a stopped server using the bind address, port and body limit
    /// from `config`.
    pub fn new(annotator: A, config: &AppConfig) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            port: config.server_port,
            max_request_bytes: config.max_request_bytes,
            annotator: Arc::new(annotator),
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections: Arc::new(AtomicU32::new(0)),
            local_addr: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// The bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Return the number of currently active client connections.
    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bind the listener and spawn the accept loop. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.local_addr.filter(|_| self.is_running()) {
            debug!(%addr, "Detection server already running");
            return Ok(addr);
        }

        let bind = format!("{}:{}", self.bind_address, self.port);
        let listener = TcpListener::bind(&bind)
            .await
            .map_err(|e| CareStudioError::Server(format!("bind {bind}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| CareStudioError::Server(format!("local address: {e}")))?;

        info!(%addr, path = endpoint::SCAN_PATH, "Detection server listening");

        let shared = Arc::new(SharedState {
            annotator: Arc::clone(&self.annotator),
            active_connections: Arc::clone(&self.active_connections),
            max_request_bytes: self.max_request_bytes,
        });
        let shutdown = Arc::clone(&self.shutdown_signal);

        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, shared).await;
        });

        self.task_handle = Some(handle);
        self.local_addr = Some(addr);
        Ok(addr)
    }

    /// Signal the accept loop to exit and wait for it. Requests already
    /// being handled run to completion on their own tasks.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.task_handle.take() else {
            return Ok(());
        };

        info!(addr = ?self.local_addr, "Stopping detection server");
        self.shutdown_signal.notify_one();
        handle
            .await
            .map_err(|e| CareStudioError::Server(format!("task join: {e}")))?;

        self.local_addr = None;
        info!("Detection server stopped");
        Ok(())
    }

    async fn accept_loop(listener: TcpListener, shutdown: Arc<Notify>, shared: Arc<SharedState<A>>) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("accept loop received shutdown signal");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let state = Arc::clone(&shared);
                            let request_id = Uuid::new_v4();
                            let span = info_span!("request", %request_id, peer = %peer_addr);
                            tokio::spawn(
                                async move {
                                    state.active_connections.fetch_add(1, Ordering::Relaxed);
                                    if let Err(e) = Self::handle_connection(stream, &state).await {
                                        warn!(error = %e, "connection handler error");
                                    }
                                    state.active_connections.fetch_sub(1, Ordering::Relaxed);
                                }
                                .instrument(span),
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(mut stream: TcpStream, state: &SharedState<A>) -> Result<()> {
        let outcome = read_request(&mut stream, state.max_request_bytes)
            .await
            .map_err(|e| CareStudioError::Server(format!("read request: {e}")))?;

        let response = match outcome {
            ReadOutcome::Request(request) => {
                debug!(
                    method = %request.method,
                    path = %request.path,
                    content_type = ?request.header("content-type"),
                    body_bytes = request.body.len(),
                    "request received"
                );
                endpoint::handle_request(
                    &request.method,
                    &request.path,
                    &request.body,
                    state.annotator.as_ref(),
                )
                .await
            }
            ReadOutcome::TooLarge => {
                warn!(limit = state.max_request_bytes, "request body too large");
                JsonResponse::rejected(413, MSG_TOO_LARGE)
            }
            ReadOutcome::Malformed => {
                warn!("malformed HTTP request");
                JsonResponse::rejected(400, MSG_MALFORMED)
            }
            ReadOutcome::Closed => {
                debug!("empty request -- closing connection");
                return Ok(());
            }
        };

        info!(status = response.status, "responding");
        send_response(&mut stream, &response).await
    }
}
