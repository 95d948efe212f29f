//! Wire envelope codec.
//!
//! Every response body has the shape
//! `{"status": "success" | <other>, "data": ..., "message": ..., "type": ...}`.
//! A success envelope must carry `data`; any other status is an application
//! failure described by `message` and `type`. Failure envelopes may also carry
//! diagnostic `data`, which is ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiFailure, FailureKind};
use crate::http::HttpResponse;
use crate::types::{Model, ModelPage, ResourceId};

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// The response wrapper as it appears on the wire.
///
/// `data` stays untyped until the status is known, so a failure envelope with
/// unexpected diagnostic data still decodes as a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl Envelope {
    pub fn success(data: impl Serialize) -> Result<Self, ApiError> {
        let data = serde_json::to_value(data).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(Self {
            status: STATUS_SUCCESS.to_string(),
            data: Some(data),
            message: None,
            error_type: None,
        })
    }

    pub fn failure(message: impl Into<String>, error_type: Option<&str>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            data: None,
            message: Some(message.into()),
            error_type: error_type.map(str::to_string),
        }
    }

    pub fn from_json(body: &str) -> Result<Self, ApiError> {
        Self::from_slice(body.as_bytes())
    }

    /// Parse raw response bytes; invalid UTF-8 is a decode error like any
    /// other malformed JSON.
    pub fn from_slice(body: &[u8]) -> Result<Self, ApiError> {
        serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ApiError> {
        serde_json::to_string(self).map_err(|e| ApiError::Serialization(e.to_string()))
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// Unwrap the payload of a success envelope, or surface the failure.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        if !self.is_success() {
            let failure = ApiFailure::new(self.message.unwrap_or_default(), self.error_type);
            tracing::debug!(
                kind = %failure.kind,
                error_type = failure.error_type.as_deref().unwrap_or(""),
                status = %self.status,
                "api call failed"
            );
            return Err(ApiError::Failure(failure));
        }
        let data = match self.data {
            Some(serde_json::Value::Null) | None => {
                return Err(ApiError::Decode("success envelope without data".to_string()))
            }
            Some(data) => data,
        };
        serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Decode a response body into the payload type `T`.
///
/// A body that is not an envelope decodes as `ApiError::Decode`, except for
/// HTTP 401/403/404, which map onto the matching failure kind.
pub fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    match Envelope::from_slice(&response.body) {
        Ok(envelope) => envelope.into_result(),
        Err(err) => match FailureKind::from_http_status(response.status) {
            Some(kind) => Err(ApiError::Failure(ApiFailure {
                kind,
                message: format!("HTTP {}", response.status),
                error_type: None,
            })),
            None => Err(err),
        },
    }
}

/// Integer result: the id returned by create, update, and delete.
pub fn decode_id(response: &HttpResponse) -> Result<ResourceId, ApiError> {
    decode(response)
}

/// Single result: one model returned by get.
pub fn decode_model(response: &HttpResponse) -> Result<Model, ApiError> {
    decode(response)
}

/// List result: one page returned by search.
pub fn decode_page(response: &HttpResponse) -> Result<ModelPage, ApiError> {
    decode(response)
}
