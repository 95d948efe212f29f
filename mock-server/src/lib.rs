//! In-memory server for the JSON REST object-store protocol.
//!
//! Serves `/{model}` (create), `/{model}/{id}` (get, update, delete),
//! `/{model}/search` (filtered, ordered, paginated search), and `/metadata`
//! (registered model names). Every answer is a
//! `{status, data, message, type}` envelope; failures name the server-side
//! error class in `type`.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub type Model = Map<String, Value>;

pub const DEFAULT_LIMIT: usize = 20;

/// Response wrapper written on every route.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self {
            status: "success".to_string(),
            data: Some(data),
            message: None,
            error_type: None,
        }
    }

    pub fn error(message: impl Into<String>, error_type: &str) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            message: Some(message.into()),
            error_type: Some(error_type.to_string()),
        }
    }
}

/// Registered models and optional Basic credentials.
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    pub models: Vec<String>,
    pub credentials: Option<(String, String)>,
}

impl ServerConfig {
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }
}

#[derive(Default)]
struct Store {
    last_id: i64,
    collections: HashMap<String, BTreeMap<i64, Model>>,
    cursors: HashMap<String, PageCursor>,
}

struct PageCursor {
    model: String,
    offset: usize,
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    store: Arc<RwLock<Store>>,
}

/// A failed request: either an error envelope or a bare status.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    envelope: Option<Envelope>,
}

impl Failure {
    fn api(message: impl Into<String>, error_type: &str) -> Self {
        Self {
            status: StatusCode::OK,
            envelope: Some(Envelope::error(message, error_type)),
        }
    }

    fn object_missing(model: &str, id: i64) -> Self {
        Self::api(format!("{model} {id} does not exist"), "ObjectMissingError")
    }

    fn not_registered(model: &str) -> Self {
        Self::api(format!("Model \"{model}\" not registered"), "ModelNotRegisteredError")
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        tracing::debug!(status = %self.status, envelope = ?self.envelope, "request failed");
        match self.envelope {
            Some(envelope) => (self.status, Json(envelope)).into_response(),
            None => self.status.into_response(),
        }
    }
}

type ApiResult = Result<Json<Envelope>, Failure>;

pub fn app(config: ServerConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
        store: Arc::new(RwLock::new(Store::default())),
    };
    Router::new()
        .route("/metadata", get(metadata))
        .route("/{model}", axum::routing::post(create_model))
        .route("/{model}/search", get(search_models))
        .route(
            "/{model}/{id}",
            get(get_model).put(update_model).delete(delete_model),
        )
        .with_state(state)
}

pub async fn run(listener: TcpListener, config: ServerConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app(config)).await
}

/// Missing credentials answer with a bare 401, wrong ones with a 403 envelope.
fn authorize(config: &ServerConfig, headers: &HeaderMap) -> Result<(), Failure> {
    let Some((username, password)) = &config.credentials else {
        return Ok(());
    };
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(Failure {
            status: StatusCode::UNAUTHORIZED,
            envelope: None,
        });
    };
    let expected = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    match value.to_str().ok().and_then(|v| v.strip_prefix("Basic ")) {
        Some(token) if token == expected => Ok(()),
        _ => Err(Failure {
            status: StatusCode::FORBIDDEN,
            envelope: Some(Envelope::error("authentication failed", "ForbiddenError")),
        }),
    }
}

fn check_registered(config: &ServerConfig, model: &str) -> Result<(), Failure> {
    if config.models.iter().any(|m| m == model) {
        Ok(())
    } else {
        Err(Failure::not_registered(model))
    }
}

fn parse_id(raw: &str) -> Result<i64, Failure> {
    raw.parse()
        .map_err(|_| Failure::api(format!("invalid id: {raw}"), "ApiFailureError"))
}

fn parse_object(body: &str) -> Result<Model, Failure> {
    match serde_json::from_str(body) {
        Ok(Value::Object(values)) => Ok(values),
        Ok(_) => Err(Failure::api("request body must be a JSON object", "ApiFailureError")),
        Err(e) => Err(Failure::api(e.to_string(), "ValueError")),
    }
}

async fn metadata(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    authorize(&state.config, &headers)?;
    Ok(Json(Envelope::success(Value::from(state.config.models.clone()))))
}

async fn create_model(
    State(state): State<AppState>,
    Path(model): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResult {
    authorize(&state.config, &headers)?;
    check_registered(&state.config, &model)?;
    let mut values = parse_object(&body)?;

    let mut store = state.store.write().await;
    store.last_id += 1;
    let id = store.last_id;
    values.insert("id".to_string(), Value::from(id));
    store.collections.entry(model).or_default().insert(id, values);
    Ok(Json(Envelope::success(Value::from(id))))
}

async fn get_model(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult {
    authorize(&state.config, &headers)?;
    check_registered(&state.config, &model)?;
    let id = parse_id(&id)?;

    let store = state.store.read().await;
    store
        .collections
        .get(&model)
        .and_then(|models| models.get(&id))
        .map(|values| Json(Envelope::success(Value::Object(values.clone()))))
        .ok_or_else(|| Failure::object_missing(&model, id))
}

async fn update_model(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: String,
) -> ApiResult {
    authorize(&state.config, &headers)?;
    check_registered(&state.config, &model)?;
    let id = parse_id(&id)?;
    let values = parse_object(&body)?;

    let mut store = state.store.write().await;
    let stored = store
        .collections
        .get_mut(&model)
        .and_then(|models| models.get_mut(&id))
        .ok_or_else(|| Failure::object_missing(&model, id))?;
    for (field, value) in values {
        if field != "id" {
            stored.insert(field, value);
        }
    }
    Ok(Json(Envelope::success(Value::from(id))))
}

async fn delete_model(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult {
    authorize(&state.config, &headers)?;
    check_registered(&state.config, &model)?;
    let id = parse_id(&id)?;

    let mut store = state.store.write().await;
    store
        .collections
        .get_mut(&model)
        .and_then(|models| models.remove(&id))
        .map(|_| Json(Envelope::success(Value::from(id))))
        .ok_or_else(|| Failure::object_missing(&model, id))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Ne,
}

impl FilterOp {
    /// Split a `feq_width` style parameter into operator and property.
    fn from_param(name: &str) -> Option<(Self, &str)> {
        let (prefix, property) = (name.get(..4)?, name.get(4..)?);
        let op = match prefix {
            "feq_" => FilterOp::Eq,
            "fgt_" => FilterOp::Gt,
            "fge_" => FilterOp::Ge,
            "flt_" => FilterOp::Lt,
            "fle_" => FilterOp::Le,
            "fne_" => FilterOp::Ne,
            _ => return None,
        };
        (!property.is_empty()).then_some((op, property))
    }

    fn matches(self, ordering: Option<Ordering>) -> bool {
        match self {
            FilterOp::Eq => ordering == Some(Ordering::Equal),
            FilterOp::Ne => ordering != Some(Ordering::Equal),
            FilterOp::Gt => ordering == Some(Ordering::Greater),
            FilterOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lt => ordering == Some(Ordering::Less),
            FilterOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

/// Compare a stored field against a query-string value, using the field's
/// JSON type to interpret the string.
fn compare_to_param(field: Option<&Value>, raw: &str) -> Option<Ordering> {
    match field {
        Some(Value::Number(n)) => n.as_f64()?.partial_cmp(&raw.parse::<f64>().ok()?),
        Some(Value::Bool(b)) => Some(b.cmp(&raw.parse::<bool>().ok()?)),
        Some(Value::String(s)) => Some(s.as_str().cmp(raw)),
        Some(Value::Null) | None => raw.is_empty().then_some(Ordering::Equal),
        Some(other) => Some(other.to_string().as_str().cmp(raw)),
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| a.map(Value::to_string).cmp(&b.map(Value::to_string))),
    }
}

struct SearchParams {
    filters: Vec<(FilterOp, String, String)>,
    order: Vec<(String, bool)>,
    cursor: Option<String>,
    limit: usize,
}

impl SearchParams {
    fn parse(params: Vec<(String, String)>) -> Result<Self, Failure> {
        let mut search = SearchParams {
            filters: Vec::new(),
            order: Vec::new(),
            cursor: None,
            limit: DEFAULT_LIMIT,
        };
        for (name, value) in params {
            if let Some((op, property)) = FilterOp::from_param(&name) {
                search.filters.push((op, property.to_string(), value));
                continue;
            }
            match name.as_str() {
                "order" => match value.strip_prefix('-') {
                    Some(property) => search.order.push((property.to_string(), true)),
                    None => search.order.push((value, false)),
                },
                "cursor" => search.cursor = Some(value),
                "limit" => {
                    search.limit = value.parse().map_err(|_| {
                        Failure::api("limit parameter must be an integer", "ApiFailureError")
                    })?
                }
                _ => {}
            }
        }
        Ok(search)
    }

    fn matches(&self, model: &Model) -> bool {
        self.filters
            .iter()
            .all(|(op, property, raw)| op.matches(compare_to_param(model.get(property), raw)))
    }

    fn compare(&self, a: &Model, b: &Model) -> Ordering {
        self.order
            .iter()
            .map(|(property, descending)| {
                let ordering = compare_fields(a.get(property), b.get(property));
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

async fn search_models(
    State(state): State<AppState>,
    Path(model): Path<String>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult {
    authorize(&state.config, &headers)?;
    check_registered(&state.config, &model)?;
    let search = SearchParams::parse(params)?;

    let mut store = state.store.write().await;
    let offset = match &search.cursor {
        // Cursors are single use; the next page gets a fresh token.
        Some(token) => match store.cursors.get(token) {
            Some(cursor) if cursor.model == model => {
                let offset = cursor.offset;
                store.cursors.remove(token);
                offset
            }
            _ => return Err(Failure::api("invalid cursor", "ApiFailureError")),
        },
        None => 0,
    };

    let mut matching: Vec<&Model> = store
        .collections
        .get(&model)
        .map(|models| models.values().filter(|m| search.matches(m)).collect())
        .unwrap_or_default();
    matching.sort_by(|a, b| search.compare(a, b));
    let total = matching.len();
    let page: Vec<Value> = matching
        .into_iter()
        .skip(offset)
        .take(search.limit)
        .map(|m| Value::Object(m.clone()))
        .collect();

    let next = offset + page.len();
    let cursor = if search.limit > 0 && next < total {
        let token = Uuid::new_v4().simple().to_string();
        store.cursors.insert(
            token.clone(),
            PageCursor {
                model,
                offset: next,
            },
        );
        Value::from(token)
    } else {
        Value::Null
    };

    let mut data = Map::new();
    data.insert("models".to_string(), Value::Array(page));
    data.insert("cursor".to_string(), cursor);
    Ok(Json(Envelope::success(Value::Object(data))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(value: Value) -> Model {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn success_envelope_omits_error_fields() {
        let json = serde_json::to_value(Envelope::success(json!(3))).unwrap();
        assert_eq!(json, json!({"status": "success", "data": 3}));
    }

    #[test]
    fn error_envelope_names_type() {
        let json = serde_json::to_value(Envelope::error("gone", "ObjectMissingError")).unwrap();
        assert_eq!(
            json,
            json!({"status": "error", "message": "gone", "type": "ObjectMissingError"})
        );
    }

    #[test]
    fn filter_params_split_prefix_and_property() {
        assert_eq!(FilterOp::from_param("feq_name"), Some((FilterOp::Eq, "name")));
        assert_eq!(FilterOp::from_param("fge_width"), Some((FilterOp::Ge, "width")));
        assert_eq!(FilterOp::from_param("feq_"), None);
        assert_eq!(FilterOp::from_param("fin_name"), None);
        assert_eq!(FilterOp::from_param("order"), None);
    }

    #[test]
    fn numeric_fields_compare_numerically() {
        let width = json!(10);
        assert_eq!(compare_to_param(Some(&width), "9"), Some(Ordering::Greater));
        assert_eq!(compare_to_param(Some(&width), "10.0"), Some(Ordering::Equal));
        assert_eq!(compare_to_param(Some(&width), "wide"), None);
    }

    #[test]
    fn missing_fields_only_equal_empty_value() {
        assert_eq!(compare_to_param(None, ""), Some(Ordering::Equal));
        assert_eq!(compare_to_param(None, "x"), None);
        assert!(FilterOp::Ne.matches(compare_to_param(None, "x")));
    }

    #[test]
    fn search_params_parse_order_and_limit() {
        let search = SearchParams::parse(vec![
            ("order".to_string(), "-created".to_string()),
            ("order".to_string(), "name".to_string()),
            ("limit".to_string(), "5".to_string()),
            ("pretty".to_string(), "1".to_string()),
        ])
        .unwrap();
        assert_eq!(
            search.order,
            [("created".to_string(), true), ("name".to_string(), false)]
        );
        assert_eq!(search.limit, 5);
        assert!(search.cursor.is_none());
    }

    #[test]
    fn search_params_reject_non_integer_limit() {
        let result = SearchParams::parse(vec![("limit".to_string(), "ten".to_string())]);
        assert!(result.is_err());
    }

    #[test]
    fn multi_key_ordering() {
        let search = SearchParams::parse(vec![
            ("order".to_string(), "-width".to_string()),
            ("order".to_string(), "name".to_string()),
        ])
        .unwrap();
        let a = model(json!({"name": "Apple", "width": 3}));
        let b = model(json!({"name": "Banana", "width": 3}));
        let c = model(json!({"name": "Cherry", "width": 7}));
        let mut models = vec![&b, &a, &c];
        models.sort_by(|x, y| search.compare(x, y));
        let names: Vec<&str> = models.iter().map(|m| m["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["Cherry", "Apple", "Banana"]);
    }
}
