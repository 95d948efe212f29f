//! Data model shared by the client, query compiler, and envelope codec.
//!
//! # Design
//! The server owns the schema, so a `Model` is an open, insertion-ordered map
//! of JSON values rather than a typed struct. Hosts that want static typing
//! can convert with `serde_json::from_value`.

use serde::{Deserialize, Serialize};

/// Server-assigned identifier of one model in a collection.
pub type ResourceId = i64;

/// One record of a resource collection.
pub type Model = serde_json::Map<String, serde_json::Value>;

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPage {
    #[serde(default)]
    pub models: Vec<Model>,
    /// Opaque continuation token, `None` when there are no further pages.
    #[serde(default)]
    pub cursor: Option<String>,
}

impl ModelPage {
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}
