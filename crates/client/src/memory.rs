//! In-memory tus server for tests.
//!
//! Implements [`HttpTransport`] directly, so no socket is involved. It
//! follows the core protocol closely enough to catch offset bookkeeping
//! bugs: PATCH requests with the wrong `Upload-Offset` get a 409, sessions
//! can be expired, and failures can be injected per method.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use tuskit_protocol::constants::{
    HEADER_CONTENT_TYPE, HEADER_LOCATION, HEADER_TUS_RESUMABLE, HEADER_UPLOAD_LENGTH,
    HEADER_UPLOAD_METADATA, HEADER_UPLOAD_OFFSET, OFFSET_OCTET_STREAM, TUS_VERSION,
};
use tuskit_protocol::{decode_metadata, parse_length, parse_offset};

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

/// Origin of every URL the server hands out.
pub const BASE_URL: &str = "http://tus.test";

/// Server-side view of one upload.
#[derive(Debug, Clone)]
pub struct ServerUpload {
    pub length: u64,
    pub offset: u64,
    pub data: Vec<u8>,
    pub metadata: HashMap<String, String>,
    pub expired: bool,
}

#[derive(Default)]
struct ServerState {
    uploads: HashMap<String, ServerUpload>,
    next_id: u64,
    created: usize,
    requests: Vec<HttpRequest>,
    failures: Vec<(Method, u16)>,
    disconnect_next: bool,
    misreport_offset: Option<u64>,
}

/// A tus server living in the test process.
#[derive(Default)]
pub struct MemoryServer {
    state: Mutex<ServerState>,
    patch_delay: Mutex<Option<Duration>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slows every PATCH down by `delay`.
    pub fn set_patch_delay(&self, delay: Duration) {
        *self.patch_delay.lock().unwrap() = Some(delay);
    }

    /// Makes the next request with `method` fail with `status`.
    pub fn fail_next(&self, method: Method, status: u16) {
        self.state.lock().unwrap().failures.push((method, status));
    }

    /// Makes the next request fail before producing a response.
    pub fn disconnect_next(&self) {
        self.state.lock().unwrap().disconnect_next = true;
    }

    /// Makes the next PATCH response report `offset` instead of the truth.
    pub fn misreport_next_offset(&self, offset: u64) {
        self.state.lock().unwrap().misreport_offset = Some(offset);
    }

    /// Registers an upload directly, bypassing the protocol. Returns its URL.
    pub fn create_upload(&self, length: u64) -> String {
        let mut state = self.state.lock().unwrap();
        insert_upload(&mut state, length, HashMap::new())
    }

    /// Marks the upload as gone; later requests get 410.
    pub fn expire(&self, url: &str) {
        if let Some(upload) = self.state.lock().unwrap().uploads.get_mut(url) {
            upload.expired = true;
        }
    }

    /// Pretends the first `offset` bytes were already received.
    pub fn set_offset(&self, url: &str, offset: u64) {
        if let Some(upload) = self.state.lock().unwrap().uploads.get_mut(url) {
            upload.offset = offset;
            upload.data.resize(offset as usize, 0);
        }
    }

    /// Stores `bytes` as the already received prefix of the upload.
    pub fn preload(&self, url: &str, bytes: &[u8]) {
        if let Some(upload) = self.state.lock().unwrap().uploads.get_mut(url) {
            upload.data = bytes.to_vec();
            upload.offset = bytes.len() as u64;
        }
    }

    /// Snapshot of one upload.
    pub fn upload(&self, url: &str) -> Option<ServerUpload> {
        self.state.lock().unwrap().uploads.get(url).cloned()
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Number of requests received with `method`.
    pub fn count(&self, method: Method) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    /// Number of sessions created through POST.
    pub fn created_count(&self) -> usize {
        self.state.lock().unwrap().created
    }

    fn handle(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        if std::mem::take(&mut state.disconnect_next) {
            return Err(TransportError::new("connection reset by peer"));
        }
        if let Some(idx) = state.failures.iter().position(|(m, _)| *m == request.method) {
            let (_, status) = state.failures.remove(idx);
            return Ok(HttpResponse::new(status));
        }
        if request.header_value(HEADER_TUS_RESUMABLE) != Some(TUS_VERSION) {
            return Ok(HttpResponse::new(412));
        }

        let response = match request.method {
            Method::Post => handle_create(&mut state, &request),
            Method::Head => handle_head(&state, &request),
            Method::Patch => handle_patch(&mut state, &request),
        };
        Ok(response.header(HEADER_TUS_RESUMABLE, TUS_VERSION))
    }
}

impl HttpTransport for MemoryServer {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
        Box::pin(async move {
            if request.method == Method::Patch {
                let delay = *self.patch_delay.lock().unwrap();
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
            }
            self.handle(request)
        })
    }
}

fn insert_upload(state: &mut ServerState, length: u64, metadata: HashMap<String, String>) -> String {
    state.next_id += 1;
    let url = format!("{BASE_URL}/files/{}", state.next_id);
    state.uploads.insert(
        url.clone(),
        ServerUpload {
            length,
            offset: 0,
            data: Vec::new(),
            metadata,
            expired: false,
        },
    );
    url
}

fn handle_create(state: &mut ServerState, request: &HttpRequest) -> HttpResponse {
    let Ok(length) = parse_length(request.header_value(HEADER_UPLOAD_LENGTH)) else {
        return HttpResponse::new(400);
    };
    let metadata = match request.header_value(HEADER_UPLOAD_METADATA) {
        Some(raw) => match decode_metadata(raw) {
            Ok(m) => m,
            Err(_) => return HttpResponse::new(400),
        },
        None => HashMap::new(),
    };

    let url = insert_upload(state, length, metadata);
    state.created += 1;
    // Relative on purpose: clients must resolve it against the endpoint.
    let location = url.trim_start_matches(BASE_URL).to_string();
    HttpResponse::new(201).header(HEADER_LOCATION, location)
}

fn lookup<'a>(
    uploads: &'a HashMap<String, ServerUpload>,
    url: &str,
) -> Result<&'a ServerUpload, HttpResponse> {
    match uploads.get(url) {
        None => Err(HttpResponse::new(404)),
        Some(upload) if upload.expired => Err(HttpResponse::new(410)),
        Some(upload) => Ok(upload),
    }
}

fn handle_head(state: &ServerState, request: &HttpRequest) -> HttpResponse {
    match lookup(&state.uploads, &request.url) {
        Ok(upload) => HttpResponse::new(200)
            .header(HEADER_UPLOAD_OFFSET, upload.offset.to_string())
            .header(HEADER_UPLOAD_LENGTH, upload.length.to_string())
            .header("Cache-Control", "no-store"),
        Err(response) => response,
    }
}

fn handle_patch(state: &mut ServerState, request: &HttpRequest) -> HttpResponse {
    if let Err(response) = lookup(&state.uploads, &request.url) {
        return response;
    }
    if request.header_value(HEADER_CONTENT_TYPE) != Some(OFFSET_OCTET_STREAM) {
        return HttpResponse::new(415);
    }
    let Ok(claimed) = parse_offset(request.header_value(HEADER_UPLOAD_OFFSET)) else {
        return HttpResponse::new(400);
    };

    let misreport = state.misreport_offset.take();
    let Some(upload) = state.uploads.get_mut(&request.url) else {
        return HttpResponse::new(404);
    };
    if claimed != upload.offset {
        return HttpResponse::new(409);
    }
    if upload.offset + request.body.len() as u64 > upload.length {
        return HttpResponse::new(400);
    }

    upload.data.extend_from_slice(&request.body);
    upload.offset += request.body.len() as u64;

    let reported = misreport.unwrap_or(upload.offset);
    HttpResponse::new(204).header(HEADER_UPLOAD_OFFSET, reported.to_string())
}
