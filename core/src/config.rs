//! Client configuration.
//!
//! `ClientConfig` is plain serde data so hosts can keep it next to the rest of
//! their settings (JSON, TOML, environment-backed loaders) and hand it to
//! `ResourceClient::new`.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Settings for one resource collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API root, for example `https://example.com/rest`.
    pub base_path: String,
    /// Name of the resource collection, for example `Fruit`.
    pub model_name: String,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl ClientConfig {
    pub fn new(base_path: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            model_name: model_name.into(),
            headers: BTreeMap::new(),
            credentials: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// HTTP Basic authentication credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Value of the `Authorization` header.
    pub fn authorization(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
