//! Resource client: CRUD round trips and search for one model collection.
//!
//! # Design
//! Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and an envelope decoder that consumes the `HttpResponse`.
//! Hosts that run their own HTTP stack can use those halves directly. The
//! convenience methods (`create`, `get`, `update`, `delete`, and
//! `Query::fetch`) execute the request through the client's `Transport`.
//! The client keeps no state between calls.

use serde_json::Value;

use crate::config::{ClientConfig, Credentials};
use crate::endpoint::Endpoint;
use crate::envelope;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::query::Query;
use crate::types::{Model, ResourceId};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Client for one resource collection, generic over its transport.
#[derive(Debug, Clone)]
pub struct ResourceClient<T> {
    endpoint: Endpoint,
    headers: Vec<(String, String)>,
    credentials: Option<Credentials>,
    transport: T,
}

#[cfg(feature = "ureq")]
impl ResourceClient<crate::transport::UreqTransport> {
    /// Client over a default `UreqTransport`.
    pub fn connect(base_path: &str, model_name: &str) -> Result<Self, ApiError> {
        Self::new(
            ClientConfig::new(base_path, model_name),
            crate::transport::UreqTransport::new(),
        )
    }
}

impl<T> ResourceClient<T> {
    pub fn new(config: ClientConfig, transport: T) -> Result<Self, ApiError> {
        let endpoint = Endpoint::new(&config.base_path, &config.model_name)?;
        Ok(Self {
            endpoint,
            headers: config.headers.into_iter().collect(),
            credentials: config.credentials,
            transport,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Start a search against this collection.
    pub fn query(&self) -> Query<'_, T> {
        Query::new(self)
    }

    pub fn build_create(&self, data: &Model) -> Result<HttpRequest, ApiError> {
        self.build_with_body(HttpMethod::Post, self.endpoint.collection_url(), data)
    }

    pub fn build_get(&self, id: ResourceId) -> HttpRequest {
        self.build(HttpMethod::Get, self.endpoint.member_url(id), None)
    }

    pub fn build_update(&self, id: ResourceId, data: &Model) -> Result<HttpRequest, ApiError> {
        self.build_with_body(HttpMethod::Put, self.endpoint.member_url(id), data)
    }

    pub fn build_delete(&self, id: ResourceId) -> HttpRequest {
        self.build(HttpMethod::Delete, self.endpoint.member_url(id), None)
    }

    /// GET against the search endpoint with an already-compiled query string.
    pub fn build_search(&self, query_string: &str) -> HttpRequest {
        self.build(HttpMethod::Get, self.endpoint.search_url(query_string), None)
    }

    fn build_with_body(&self, method: HttpMethod, url: String, data: &Model) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(data).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(self.build(method, url, Some(body)))
    }

    fn build(&self, method: HttpMethod, url: String, body: Option<String>) -> HttpRequest {
        let mut headers = Vec::with_capacity(self.headers.len() + 2);
        if body.is_some() {
            headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
        }
        if let Some(credentials) = &self.credentials {
            headers.push(("authorization".to_string(), credentials.authorization()));
        }
        headers.extend(self.headers.iter().cloned());
        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }
}

impl<T: Transport> ResourceClient<T> {
    /// Create a model and return its server-assigned id.
    pub fn create(&self, data: &Model) -> Result<ResourceId, ApiError> {
        let response = self.send(&self.build_create(data)?)?;
        envelope::decode_id(&response)
    }

    pub fn get(&self, id: ResourceId) -> Result<Model, ApiError> {
        let response = self.send(&self.build_get(id))?;
        envelope::decode_model(&response)
    }

    /// Update the fields present in `data`; returns the id echoed by the server.
    pub fn update(&self, id: ResourceId, data: &Model) -> Result<ResourceId, ApiError> {
        let response = self.send(&self.build_update(id, data)?)?;
        envelope::decode_id(&response)
    }

    pub fn delete(&self, id: ResourceId) -> Result<ResourceId, ApiError> {
        let response = self.send(&self.build_delete(id))?;
        envelope::decode_id(&response)
    }

    /// Create from any serializable value that encodes as a JSON object.
    pub fn create_from<S: serde::Serialize>(&self, data: &S) -> Result<ResourceId, ApiError> {
        self.create(&to_model(data)?)
    }

    pub(crate) fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        tracing::debug!(
            method = request.method.as_str(),
            url = %request.url,
            model = self.endpoint.model_name(),
            "dispatching request"
        );
        let response = self.transport.execute(request)?;
        tracing::debug!(status = response.status, "received response");
        Ok(response)
    }
}

/// Convert a serializable value into a `Model`.
pub fn to_model<S: serde::Serialize>(data: &S) -> Result<Model, ApiError> {
    match serde_json::to_value(data).map_err(|e| ApiError::Serialization(e.to_string()))? {
        Value::Object(model) => Ok(model),
        other => Err(ApiError::Serialization(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}
