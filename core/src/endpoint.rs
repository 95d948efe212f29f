//! Canonical URLs for a resource collection and its members.

use crate::error::ApiError;
use crate::types::ResourceId;

/// Resolves collection, member, and search URLs for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_path: String,
    model_name: String,
}

impl Endpoint {
    /// Trailing `/` on `base_path` are stripped. Fails if either part is empty.
    pub fn new(base_path: &str, model_name: &str) -> Result<Self, ApiError> {
        let base_path = base_path.trim().trim_end_matches('/');
        if base_path.is_empty() {
            return Err(ApiError::Config("base path is empty".to_string()));
        }
        let model_name = model_name.trim().trim_matches('/');
        if model_name.is_empty() {
            return Err(ApiError::Config("model name is empty".to_string()));
        }
        Ok(Self {
            base_path: base_path.to_string(),
            model_name: model_name.to_string(),
        })
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// `<base>/<model>`
    pub fn collection_url(&self) -> String {
        format!("{}/{}", self.base_path, self.model_name)
    }

    /// `<base>/<model>/<id>`
    pub fn member_url(&self, id: ResourceId) -> String {
        format!("{}/{}/{id}", self.base_path, self.model_name)
    }

    /// `<base>/<model>/search`, with `?<query>` appended only when non-empty.
    pub fn search_url(&self, query_string: &str) -> String {
        let url = format!("{}/{}/search", self.base_path, self.model_name);
        if query_string.is_empty() {
            url
        } else {
            format!("{url}?{query_string}")
        }
    }
}
