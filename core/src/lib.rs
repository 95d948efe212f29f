//! Client core for a JSON REST object-store API.
//!
//! # Overview
//! Each model collection on the server supports create, get, update, delete,
//! and a filtered, sorted, paginated search. Every response is wrapped in a
//! `{status, data, message, type}` envelope. This crate builds the requests,
//! compiles search queries, and decodes envelopes into typed results or a
//! structured `ApiError`.
//!
//! # Design
//! - `ResourceClient` is stateless apart from its configuration; every
//!   operation is a single round trip.
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   the `Transport` trait performs the actual I/O. `UreqTransport` is
//!   provided behind the default `ureq` feature.
//! - `Query` accumulates filter, order, and cursor parameters and compiles
//!   them into a percent-encoded query string at fetch time.
//!
//! ```no_run
//! use jsonrest_core::ResourceClient;
//!
//! # fn main() -> Result<(), jsonrest_core::ApiError> {
//! let fruit = ResourceClient::connect("http://localhost:3000/rest", "Fruit")?;
//! let page = fruit
//!     .query()
//!     .filter("name =", "Apple")?
//!     .order("width", true)
//!     .fetch(10)?;
//! for model in &page.models {
//!     println!("{model:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod http;
pub mod query;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod types;

pub use client::{to_model, ResourceClient};
pub use config::{ClientConfig, Credentials};
pub use endpoint::Endpoint;
pub use envelope::Envelope;
pub use error::{ApiError, ApiFailure, FailureKind, FilterError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use query::{FilterOperator, Query};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{Model, ModelPage, ResourceId};
