//! Blocking transport backed by a `ureq` agent.

use std::time::Duration;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// Default cap on a response body; search pages can exceed ureq's 10 MB.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Executes requests with `ureq`.
///
/// The agent is configured so 4xx/5xx statuses come back as responses rather
/// than errors; the envelope in the body decides success or failure.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    max_body_bytes: u64,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Bound the whole round trip, including connect and body read.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self {
            agent,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Reject response bodies larger than `limit` bytes.
    pub fn with_max_body_bytes(mut self, limit: u64) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let body = request.body.as_deref();

        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), headers).call(),
            HttpMethod::Post => {
                let builder = with_headers(self.agent.post(url), headers);
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Put => {
                let builder = with_headers(self.agent.put(url), headers);
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(|e| {
            TransportError::with_source(format!("{} {url} failed", request.method.as_str()), e)
        })?;

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
            .limit(self.max_body_bytes)
            .read_to_vec()
            .map_err(|e| TransportError::with_source(format!("reading response from {url} failed"), e))?;

        Ok(HttpResponse { status, headers, body })
    }
}
