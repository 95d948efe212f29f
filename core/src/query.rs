//! Query compiler for the search endpoint.
//!
//! # Design
//! A `Query` accumulates `(name, value)` parameter records in call order and
//! only compiles them into a query string when `query_string` or `fetch` is
//! called. Filters compile to `<prefix><property>` names (`feq_name`,
//! `fge_width`, ...), sort keys to repeated `order` parameters, and the
//! cursor and page size to `cursor` and `limit`. Names and values are
//! percent-encoded so that every character except the RFC 3986 unreserved
//! set survives the round trip.
//!
//! Builder methods take and return `self`; a query is owned by one caller
//! and is not meant to be shared.

use serde_json::Value;

use crate::client::ResourceClient;
use crate::envelope;
use crate::error::{ApiError, FilterError};
use crate::http::Transport;
use crate::types::ModelPage;

pub const ORDER_PARAM: &str = "order";
pub const CURSOR_PARAM: &str = "cursor";
pub const LIMIT_PARAM: &str = "limit";

/// Comparison operators accepted in a filter expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Ne,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 6] = [
        FilterOperator::Eq,
        FilterOperator::Gt,
        FilterOperator::Ge,
        FilterOperator::Lt,
        FilterOperator::Le,
        FilterOperator::Ne,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(FilterOperator::Eq),
            ">" => Some(FilterOperator::Gt),
            ">=" => Some(FilterOperator::Ge),
            "<" => Some(FilterOperator::Lt),
            "<=" => Some(FilterOperator::Le),
            "!=" => Some(FilterOperator::Ne),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Gt => ">",
            FilterOperator::Ge => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Le => "<=",
            FilterOperator::Ne => "!=",
        }
    }

    /// Prefix of the compiled parameter name.
    pub fn prefix(self) -> &'static str {
        match self {
            FilterOperator::Eq => "feq_",
            FilterOperator::Gt => "fgt_",
            FilterOperator::Ge => "fge_",
            FilterOperator::Lt => "flt_",
            FilterOperator::Le => "fle_",
            FilterOperator::Ne => "fne_",
        }
    }
}

/// Split `"<property> <operator>"` at the first space.
pub fn parse_filter_expression(expression: &str) -> Result<(&str, FilterOperator), FilterError> {
    let Some((property, token)) = expression.split_once(' ') else {
        return Err(FilterError::OperatorNotFound {
            expression: expression.to_string(),
        });
    };
    let operator = FilterOperator::from_token(token).ok_or_else(|| FilterError::UnsupportedOperator {
        operator: token.to_string(),
    })?;
    Ok((property, operator))
}

/// Canonical string form of a filter value.
///
/// Strings are used verbatim, numbers and booleans in their JSON spelling,
/// `null` as the empty string, and arrays or objects as compact JSON.
pub fn to_query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Percent-encode `name=value` pairs joined by `&`.
pub fn encode_query_string<'p, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'p str, &'p str)>,
{
    params
        .into_iter()
        .map(|(name, value)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Inverse of `encode_query_string`. Repeated names are kept in order.
pub fn decode_query_string(query: &str) -> Result<Vec<(String, String)>, ApiError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = urlencoding::decode(name).map_err(|e| ApiError::Decode(e.to_string()))?;
            let value = urlencoding::decode(value).map_err(|e| ApiError::Decode(e.to_string()))?;
            Ok((name.into_owned(), value.into_owned()))
        })
        .collect()
}

/// Search builder bound to a `ResourceClient`.
#[derive(Debug)]
pub struct Query<'a, T> {
    client: &'a ResourceClient<T>,
    params: Vec<(String, String)>,
}

impl<'a, T> Query<'a, T> {
    pub(crate) fn new(client: &'a ResourceClient<T>) -> Self {
        Self {
            client,
            params: Vec::new(),
        }
    }

    /// Add a filter such as `filter("width >=", 5)`.
    ///
    /// Fails without touching the network if the expression has no space or
    /// the operator is not one of `=`, `>`, `>=`, `<`, `<=`, `!=`.
    pub fn filter(mut self, expression: &str, value: impl Into<Value>) -> Result<Self, ApiError> {
        let (property, operator) = parse_filter_expression(expression)?;
        let name = format!("{}{property}", operator.prefix());
        self.params.push((name, to_query_value(&value.into())));
        Ok(self)
    }

    /// Add a sort key. Repeated calls add further keys in call order.
    pub fn order(mut self, property: &str, descending: bool) -> Self {
        let value = if descending {
            format!("-{property}")
        } else {
            property.to_string()
        };
        self.params.push((ORDER_PARAM.to_string(), value));
        self
    }

    /// Continue from a cursor returned by a previous page.
    pub fn with_cursor(mut self, cursor: &str) -> Self {
        self.params.push((CURSOR_PARAM.to_string(), cursor.to_string()));
        self
    }

    /// Accumulated parameters, in call order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Compile the accumulated parameters. `limit` is appended only when
    /// greater than zero; the builder itself is not modified.
    pub fn query_string(&self, limit: usize) -> String {
        let limit = (limit > 0).then(|| limit.to_string());
        let params = self
            .params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .chain(limit.as_deref().map(|limit| (LIMIT_PARAM, limit)));
        encode_query_string(params)
    }
}

impl<T: Transport> Query<'_, T> {
    /// Run the search and return one page. A `limit` of zero leaves the page
    /// size to the server. Each call issues a fresh request.
    pub fn fetch(&self, limit: usize) -> Result<ModelPage, ApiError> {
        let request = self.client.build_search(&self.query_string(limit));
        let response = self.client.send(&request)?;
        envelope::decode_page(&response)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::config::ClientConfig;
    use crate::error::TransportError;
    use crate::http::{HttpRequest, HttpResponse};

    #[derive(Debug)]
    struct Unreachable;

    impl Transport for Unreachable {
        fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::new("no network in unit tests"))
        }
    }

    fn client() -> ResourceClient<Unreachable> {
        ResourceClient::new(ClientConfig::new("http://localhost:8080/rest", "Fruit"), Unreachable).unwrap()
    }

    #[rstest]
    #[case("=", "feq_")]
    #[case(">", "fgt_")]
    #[case(">=", "fge_")]
    #[case("<", "flt_")]
    #[case("<=", "fle_")]
    #[case("!=", "fne_")]
    fn filter_compiles_operator_prefix(#[case] token: &str, #[case] prefix: &str) {
        let client = client();
        let query = client.query().filter(&format!("width {token}"), 5).unwrap();
        assert_eq!(query.params(), [(format!("{prefix}width"), "5".to_string())]);
    }

    #[test]
    fn operator_table_round_trips() {
        for op in FilterOperator::ALL {
            assert_eq!(FilterOperator::from_token(op.token()), Some(op));
        }
    }

    #[test]
    fn filter_without_space_is_operator_not_found() {
        let client = client();
        let err = client.query().filter("name", "Pear").unwrap_err();
        assert!(matches!(
            err,
            ApiError::Filter(FilterError::OperatorNotFound { ref expression }) if expression == "name"
        ));
    }

    #[rstest]
    #[case("name ==")]
    #[case("name <>")]
    #[case("name IN")]
    #[case("name  =")]
    #[case("name ")]
    #[case("full name =")]
    fn filter_with_unknown_token_is_unsupported(#[case] expression: &str) {
        let client = client();
        let err = client.query().filter(expression, "Pear").unwrap_err();
        assert!(matches!(err, ApiError::Filter(FilterError::UnsupportedOperator { .. })));
    }

    #[test]
    fn order_accumulates_in_call_order() {
        let client = client();
        let query = client
            .query()
            .order("modified_datetime", true)
            .order("width", false);
        assert_eq!(
            query.query_string(10),
            "order=-modified_datetime&order=width&limit=10"
        );
    }

    #[test]
    fn empty_query_compiles_to_empty_string() {
        let client = client();
        assert_eq!(client.query().query_string(0), "");
    }

    #[test]
    fn zero_limit_is_omitted() {
        let client = client();
        let query = client.query().with_cursor("abc");
        assert_eq!(query.query_string(0), "cursor=abc");
    }

    #[test]
    fn query_string_does_not_accumulate_limit() {
        let client = client();
        let query = client.query().filter("name =", "Apple").unwrap();
        assert_eq!(query.query_string(2), query.query_string(2));
        assert_eq!(query.params().len(), 1);
    }

    #[test]
    fn reserved_characters_are_escaped() {
        let client = client();
        let query = client.query().filter("name =", "a&b=c+d e").unwrap();
        assert_eq!(query.query_string(0), "feq_name=a%26b%3Dc%2Bd%20e");
    }

    #[test]
    fn values_round_trip_through_encoding() {
        let client = client();
        let value = "Pear & Apple = 1+1 \u{e9}t\u{e9} ~_.-";
        let query = client
            .query()
            .filter("na&me+\u{e9} =", value)
            .unwrap()
            .with_cursor("c=1&d");
        let decoded = decode_query_string(&query.query_string(3)).unwrap();
        assert_eq!(
            decoded,
            [
                ("feq_na&me+\u{e9}".to_string(), value.to_string()),
                ("cursor".to_string(), "c=1&d".to_string()),
                ("limit".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn scalar_values_have_canonical_strings() {
        assert_eq!(to_query_value(&Value::from("x")), "x");
        assert_eq!(to_query_value(&Value::from(12)), "12");
        assert_eq!(to_query_value(&Value::from(2.5)), "2.5");
        assert_eq!(to_query_value(&Value::from(true)), "true");
        assert_eq!(to_query_value(&Value::Null), "");
        assert_eq!(to_query_value(&serde_json::json!([1, "a"])), r#"[1,"a"]"#);
    }

    #[test]
    fn fetch_surfaces_transport_errors() {
        let client = client();
        let err = client.query().fetch(5).unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
