//! The I/O seam: executes `HttpRequest` values and returns `HttpResponse` data.
//!
//! # Design
//! Everything above this trait is deterministic. `UreqTransport` is the
//! blocking production implementation; tests substitute a scripted
//! transport. Non-2xx statuses come back as responses, not errors, so the
//! executor alone decides how a status is interpreted.

use std::sync::RwLock;

use tracing::{debug, warn};
use ureq::unversioned::multipart::{Form, Part};

use crate::error::TransportError;
use crate::http::{HttpBody, HttpMethod, HttpRequest, HttpResponse};
use crate::multipart::{FilePart, MultipartForm};

pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Drop any cookies or other per-session state held by the transport.
    fn reset_session(&self) {}
}

/// Blocking transport backed by a `ureq` agent with a cookie jar.
pub struct UreqTransport {
    agent: RwLock<ureq::Agent>,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: RwLock::new(new_agent()),
        }
    }

    fn agent(&self) -> ureq::Agent {
        self.agent
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Status codes are data here, so 4xx/5xx must not turn into `Err`.
fn new_agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent()
}

fn prepare<B>(builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
    request
        .headers
        .iter()
        .fold(builder, |builder, (name, value)| {
            builder.header(name.as_str(), value.as_str())
        })
        .config()
        .timeout_global(Some(request.timeout))
        .build()
}

/// ureq sets `Content-Type` with the boundary it generates.
fn multipart_body(form: &MultipartForm) -> Form<'_> {
    form.parts()
        .iter()
        .fold(Form::new(), |body, part| body.part(&part.name, file_part(part)))
}

fn file_part(part: &FilePart) -> Part<'_> {
    let bytes = || Part::bytes(&part.data).file_name(&part.filename);
    bytes().mime_str(&part.content_type).unwrap_or_else(|e| {
        warn!(
            content_type = %part.content_type,
            error = %e,
            "invalid upload content type, sending without one"
        );
        bytes()
    })
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent();
        let url = request.url.as_str();
        debug!(method = request.method.as_str(), url, "sending request");

        let result = match (request.method, &request.body) {
            (HttpMethod::Get, _) => prepare(agent.get(url), request).call(),
            (HttpMethod::Delete, _) => prepare(agent.delete(url), request).call(),
            (HttpMethod::Post, Some(HttpBody::Bytes(body))) => {
                prepare(agent.post(url), request).send(body.as_slice())
            }
            (HttpMethod::Post, Some(HttpBody::Multipart(form))) => {
                prepare(agent.post(url), request).send(multipart_body(form))
            }
            (HttpMethod::Post, None) => prepare(agent.post(url), request).send_empty(),
        };

        let mut response = result.map_err(|e| classify(e, request))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(request.max_response_bytes)
            .read_to_string()
            .map_err(|e| TransportError::UnreadableBody {
                status,
                detail: e.to_string(),
            })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn reset_session(&self) {
        let mut agent = self
            .agent
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *agent = new_agent();
    }
}

fn classify(error: ureq::Error, request: &HttpRequest) -> TransportError {
    match error {
        ureq::Error::Timeout(_) => TransportError::Timeout(request.timeout),
        ureq::Error::Io(ref io) if io.kind() == std::io::ErrorKind::TimedOut => {
            TransportError::Timeout(request.timeout)
        }
        other => TransportError::Network(other.to_string()),
    }
}
