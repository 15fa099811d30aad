//! Request executor: turns an `ApiRequest` into one HTTP round-trip.
//!
//! # Design
//! `build_request` and `parse_response` are pure and hold all of the header,
//! body and status rules; `execute` only glues them to the transport and
//! keeps the connectivity state honest. There is exactly one attempt per
//! call. Retrying is the caller's decision, typically after
//! `check_connection` reports the backend back.
//!
//! Every failure is an `ApiError`. Transport failures (no response) carry
//! status 0 and flip connectivity to unavailable, so the next call pays for
//! at most one gated health probe instead of a full request timeout.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::connectivity::ConnectivityProber;
use crate::error::{ApiError, TransportError};
use crate::http::{
    cache_busted, no_cache_headers, HttpBody, HttpMethod, HttpRequest, HttpResponse,
};
use crate::multipart::MultipartForm;
use crate::token::TokenStore;
use crate::transport::Transport;

/// Login endpoint; POSTs to it are always form-encoded.
pub const TOKEN_ENDPOINT: &str = "/auth/token";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    /// Already `application/x-www-form-urlencoded`; sent verbatim.
    Form(String),
    /// Sent verbatim.
    Text(String),
    Multipart(MultipartForm),
}

/// One logical API call, built per request and dropped afterwards.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub endpoint: String,
    pub method: HttpMethod,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            body: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, endpoint)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::transport(format!("failed to encode request body: {e}")))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    pub fn form(mut self, pairs: &[(&str, &str)]) -> Self {
        let encoded = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        self.body = Some(RequestBody::Form(encoded));
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = Some(RequestBody::Multipart(form));
        self
    }

    pub fn is_login(&self) -> bool {
        self.method == HttpMethod::Post && is_login_endpoint(&self.endpoint)
    }
}

fn is_login_endpoint(endpoint: &str) -> bool {
    endpoint.split('?').next() == Some(TOKEN_ENDPOINT)
}

pub struct RequestExecutor {
    base_url: String,
    timeout: Duration,
    max_response_bytes: u64,
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    connectivity: Arc<ConnectivityProber>,
}

impl RequestExecutor {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        connectivity: Arc<ConnectivityProber>,
    ) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout: config.request_timeout,
            max_response_bytes: config.max_response_bytes,
            transport,
            tokens,
            connectivity,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{endpoint}", self.base_url)
        } else {
            format!("{}/{endpoint}", self.base_url)
        }
    }

    /// Describe the HTTP request for `request` with the current token attached.
    pub fn build_request(&self, request: &ApiRequest) -> HttpRequest {
        let mut headers = no_cache_headers();
        if let Some(token) = self.tokens.get_token() {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        let (content_type, body) = match &request.body {
            None => (None, None),
            Some(RequestBody::Json(value)) => (
                Some(JSON_CONTENT_TYPE),
                Some(HttpBody::Bytes(value.to_string().into_bytes())),
            ),
            Some(RequestBody::Form(raw)) => (
                Some(FORM_CONTENT_TYPE),
                Some(HttpBody::Bytes(raw.clone().into_bytes())),
            ),
            Some(RequestBody::Text(raw)) => (
                Some(TEXT_CONTENT_TYPE),
                Some(HttpBody::Bytes(raw.clone().into_bytes())),
            ),
            // The transport adds the boundary-carrying Content-Type.
            Some(RequestBody::Multipart(form)) => (None, Some(HttpBody::Multipart(form.clone()))),
        };
        let content_type = if request.is_login() {
            Some(FORM_CONTENT_TYPE)
        } else {
            content_type
        };
        if let Some(content_type) = content_type {
            headers.push(("Content-Type".to_string(), content_type.to_string()));
        }

        HttpRequest {
            method: request.method,
            url: cache_busted(&self.url(&request.endpoint)),
            headers,
            body,
            timeout: self.timeout,
            max_response_bytes: self.max_response_bytes,
        }
    }

    /// Issue `request` once and decode the response body as `T`.
    pub fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        if !self.connectivity.is_available() && !self.connectivity.check_connection() {
            return Err(ApiError::transport(format!(
                "unable to connect to backend at {}",
                self.base_url
            )));
        }

        let http = self.build_request(request);
        debug!(method = http.method.as_str(), endpoint = %request.endpoint, "api request");

        match self.transport.execute(&http) {
            Ok(response) => {
                debug!(endpoint = %request.endpoint, status = response.status, "api response");
                if request.is_login() && response.is_success() {
                    self.connectivity.mark_available(true);
                }
                parse_response(&request.endpoint, response)
            }
            Err(TransportError::UnreadableBody { status, detail }) => {
                warn!(
                    endpoint = %request.endpoint,
                    status,
                    %detail,
                    "api response body unreadable"
                );
                Err(ApiError::new(
                    status,
                    format!("could not read response from {}: {detail}", request.endpoint),
                ))
            }
            Err(e) => {
                self.connectivity.mark_available(false);
                let message = match &e {
                    TransportError::Timeout(after) => format!(
                        "request to {} timed out after {} ms",
                        request.endpoint,
                        after.as_millis()
                    ),
                    _ => format!("unable to connect to backend at {}: {e}", self.base_url),
                };
                warn!(
                    endpoint = %request.endpoint,
                    error = %e,
                    "api request failed without a response"
                );
                Err(ApiError::transport(message))
            }
        }
    }
}

/// Map a response to `T` or to the `ApiError` it represents.
///
/// Successful responses without a JSON content type decode as an empty
/// object, so callers asking for `serde_json::Value` get `{}`.
pub fn parse_response<T: DeserializeOwned>(
    endpoint: &str,
    response: HttpResponse,
) -> Result<T, ApiError> {
    if !response.is_success() {
        return Err(error_from_response(endpoint, &response));
    }
    let body = if response.is_json() && !response.body.trim().is_empty() {
        response.body.as_str()
    } else {
        "{}"
    };
    serde_json::from_str(body)
        .map_err(|e| ApiError::new(response.status, format!("invalid response body: {e}")))
}

fn error_from_response(endpoint: &str, response: &HttpResponse) -> ApiError {
    let message = server_message(&response.body).unwrap_or_else(|| match response.status {
        401 if is_login_endpoint(endpoint) => "incorrect username or password".to_string(),
        401 => "session expired, please log in again".to_string(),
        status @ 500..=599 => format!("server error (status {status})"),
        status => format!("request failed with status {status}"),
    });
    ApiError::new(response.status, message)
}

/// Pull a human-readable message out of a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    for key in ["detail", "message", "error"] {
        match value.get(key) {
            Some(Value::String(text)) if !text.is_empty() => return Some(text.clone()),
            Some(Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if !messages.is_empty() {
                    return Some(messages.join("; "));
                }
            }
            _ => {}
        }
    }
    None
}
