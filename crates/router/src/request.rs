//! Request value object passed through the middleware pipeline.
//!
//! This module contains the request-scoped types of the kernel:
//! - `Request`: method, uri, headers, body and everything the dispatcher attaches to it
//! - `PathParams`: parameters extracted from the matched route pattern, in declaration order
//! - `MatchedRoute`: the name and pattern of the route that is being executed
//!
//! There is no ambient request state: every middleware and handler receives the request
//! explicitly and request-scoped data travels in [`Request::extensions`].

use crate::error::ExtractError;
use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri, Version, header};
use serde::de::DeserializeOwned;

/// An HTTP request as seen by middleware and handlers.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    params: PathParams,
    extensions: Extensions,
}

impl Request {
    /// Creates a request with the given method and uri, no headers and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: PathParams::empty(),
            extensions: Extensions::new(),
        }
    }

    /// Returns the HTTP method of the request
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the URI of the request
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the path component of the URI
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the HTTP headers of the request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Returns the path parameters extracted by the router
    pub fn path_params(&self) -> &PathParams {
        &self.params
    }

    /// Shortcut for `path_params().get(name)`
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub(crate) fn set_path_params(&mut self, params: PathParams) {
        self.params = params;
    }

    /// Request-scoped data shared between middleware and handlers.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// The route currently being executed, set by the dispatcher on a match.
    pub fn matched_route(&self) -> Option<&MatchedRoute> {
        self.extensions.get::<MatchedRoute>()
    }

    /// Decoded query string pairs in the order they appear.
    ///
    /// # Errors
    /// Returns [`ExtractError::Query`] when the query string is not valid urlencoded data.
    pub fn query_pairs(&self) -> Result<Vec<(String, String)>, ExtractError> {
        self.query()
    }

    /// Deserializes the query string into `T`.
    ///
    /// # Errors
    /// Returns [`ExtractError::Query`] when the query string does not fit `T`.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, ExtractError> {
        let query = self.uri.query().unwrap_or_default();
        serde_urlencoded::from_str(query).map_err(|source| ExtractError::Query { source })
    }

    /// Deserializes an `application/x-www-form-urlencoded` body into `T`.
    ///
    /// # Errors
    /// Fails when the content type is not a urlencoded form or the body does not fit `T`.
    pub fn form<T: DeserializeOwned>(&self) -> Result<T, ExtractError> {
        self.expect_content_type(&mime::APPLICATION_WWW_FORM_URLENCODED)?;
        serde_urlencoded::from_bytes(&self.body).map_err(|source| ExtractError::Form { source })
    }

    /// Deserializes a JSON body into `T`.
    ///
    /// # Errors
    /// Fails when the content type is not JSON or the body does not fit `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ExtractError> {
        self.expect_content_type(&mime::APPLICATION_JSON)?;
        Ok(serde_json::from_slice(&self.body)?)
    }

    fn expect_content_type(&self, expected: &mime::Mime) -> Result<(), ExtractError> {
        let found = self.headers.get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()).unwrap_or_default();

        let matches = found
            .parse::<mime::Mime>()
            .is_ok_and(|mime| mime.type_() == expected.type_() && mime.subtype() == expected.subtype());

        if matches {
            Ok(())
        } else {
            Err(ExtractError::UnsupportedContentType { expected: expected.to_string(), found: found.to_owned() })
        }
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            params: PathParams::empty(),
            extensions: parts.extensions,
        }
    }
}

/// Path parameters extracted from the URL path of a request.
///
/// For the pattern `/users/{id}` and the path `/users/42`, `get("id")` returns `"42"`.
/// Iteration follows the order in which the placeholders are declared in the pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    inner: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self { inner: Vec::new() }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { inner: Vec::with_capacity(capacity) }
    }

    pub(crate) fn push(&mut self, name: String, value: String) {
        self.inner.push((name, value));
    }

    /// Returns true if there are no path parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of path parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.inner.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Name and pattern of the route selected by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute {
    pub name: Option<String>,
    pub pattern: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    fn request(method: Method, uri: &str, content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(Bytes::from_static(body.as_bytes())).unwrap().into()
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Paging {
        page: u32,
        per_page: Option<u32>,
    }

    #[test]
    fn test_from_http_request() {
        let req = request(Method::PUT, "/contacts/1?x=y", Some("text/plain"), "hi");

        assert_eq!(req.method(), Method::PUT);
        assert_eq!(req.path(), "/contacts/1");
        assert_eq!(req.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(req.body().as_ref(), b"hi");
        assert!(req.path_params().is_empty());
        assert!(req.matched_route().is_none());
    }

    #[test]
    fn test_query() {
        let req = request(Method::GET, "/contacts?page=2&q=a%20b", None, "");

        assert_eq!(req.query_pairs().unwrap(), vec![("page".to_owned(), "2".to_owned()), ("q".to_owned(), "a b".to_owned())]);
        assert_eq!(req.query::<Paging>().unwrap(), Paging { page: 2, per_page: None });

        let no_query = request(Method::GET, "/contacts", None, "");
        assert!(no_query.query_pairs().unwrap().is_empty());
        assert!(matches!(no_query.query::<Paging>(), Err(ExtractError::Query { .. })));
    }

    #[test]
    fn test_form_body() {
        let req = request(
            Method::POST,
            "/contacts",
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            "name=Ada+Lovelace&email=ada%40example.com",
        );

        let form = req.form::<HashMap<String, String>>().unwrap();
        assert_eq!(form["name"], "Ada Lovelace");
        assert_eq!(form["email"], "ada@example.com");
    }

    #[test]
    fn test_body_content_type_is_checked() {
        let req = request(Method::POST, "/contacts", Some("application/json"), r#"{"page": 3}"#);

        assert_eq!(req.json::<Paging>().unwrap(), Paging { page: 3, per_page: None });
        assert!(matches!(req.form::<HashMap<String, String>>(), Err(ExtractError::UnsupportedContentType { .. })));

        let without_type = request(Method::POST, "/contacts", None, r#"{"page": 3}"#);
        assert!(matches!(without_type.json::<Paging>(), Err(ExtractError::UnsupportedContentType { .. })));
    }

    #[test]
    fn test_path_params_preserve_order() {
        let mut params = PathParams::empty();
        params.push("b".into(), "2".into());
        params.push("a".into(), "1".into());

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("c"), None);
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("b", "2"), ("a", "1")]);
    }
}
