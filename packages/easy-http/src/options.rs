//! Request options and their builders.
//!
//! A [`RequestOptionsBuilder`] describes a GET request. Calling
//! [`RequestOptionsBuilder::post`] turns it into a [`PostOptionsBuilder`],
//! the only builder that can choose a body encoding. There is no way back to
//! GET from a POST builder.
//!
//! ```ignore
//! use easy_http::{PostEncoding, RequestOptions};
//!
//! let options = RequestOptions::builder()
//!     .path("users")
//!     .post()
//!     .encoding(PostEncoding::Form)
//!     .param("name", "alice")
//!     .build()?;
//! ```
//!
//! Builder methods never fail on their own. The first misuse is remembered
//! and reported by `build()`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::{Method, PostEncoding};

/// Ordered request parameters.
pub type Params = Map<String, Value>;

/// Where a request goes: a complete URL, or a path under the client's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Url(String),
    Path(String),
}

/// Immutable description of a request, produced by the builders.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    method: Method,
    target: Target,
    post_encoding: PostEncoding,
    params: Option<Params>,
    headers: Vec<(String, String)>,
    multi_headers: Vec<(String, Vec<String>)>,
}

impl RequestOptions {
    pub fn builder() -> RequestOptionsBuilder {
        RequestOptionsBuilder::new()
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// True when the target is a complete URL and the base URL is ignored.
    pub fn is_full_url(&self) -> bool {
        matches!(self.target, Target::Url(_))
    }

    /// Only meaningful for POST.
    pub fn post_encoding(&self) -> PostEncoding {
        self.post_encoding
    }

    /// `None` when no parameter was given.
    pub fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }

    /// Single-valued headers; a later value for the same name replaced the earlier one.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Multi-valued headers; every value is sent.
    pub fn multi_headers(&self) -> &[(String, Vec<String>)] {
        &self.multi_headers
    }
}

/// Builder for GET requests, and the starting point for POST requests.
#[derive(Debug, Clone, Default)]
pub struct RequestOptionsBuilder {
    target: Option<Target>,
    params: Params,
    headers: Vec<(String, String)>,
    multi_headers: Vec<(String, Vec<String>)>,
    error: Option<Error>,
}

impl RequestOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send to a complete URL. Replaces any earlier url or path.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.target = Some(Target::Url(url.into()));
        self
    }

    /// Send to a path under the base URL. Replaces any earlier url or path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.target = Some(Target::Path(path.into()));
        self
    }

    /// GET is the default; this exists for symmetry with [`post`](Self::post).
    pub fn get(self) -> Self {
        self
    }

    pub fn post(self) -> PostOptionsBuilder {
        PostOptionsBuilder {
            inner: self,
            encoding: PostEncoding::default(),
        }
    }

    /// Add one parameter. A null value or a value that cannot be represented
    /// as JSON is reported by `build()`.
    pub fn param(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(Value::Null) => self.fail(Error::validation(format!("value for '{key}' is null"))),
            Ok(value) => {
                self.params.insert(key, value);
            }
            Err(e) => self.fail(e.into()),
        }
        self
    }

    /// Add a set of parameters. An empty set is a misuse.
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Serialize,
    {
        let mut any = false;
        for (key, value) in params {
            any = true;
            self = self.param(key, value);
        }
        if !any {
            self.fail(Error::validation("params is empty"));
        }
        self
    }

    /// Set a header, replacing an earlier value of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Set several headers with [`header`](Self::header) semantics. An empty set is a misuse.
    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut any = false;
        for (name, value) in headers {
            any = true;
            self = self.header(name, value);
        }
        if !any {
            self.fail(Error::validation("header is empty"));
        }
        self
    }

    /// Append a header value, keeping earlier values of the same name.
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .multi_headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1.push(value),
            None => self.multi_headers.push((name, vec![value])),
        }
        self
    }

    /// Append several header value lists. An empty set is a misuse; an empty
    /// list for one name is rejected when the request is assembled.
    pub fn multi_headers<K>(mut self, headers: impl IntoIterator<Item = (K, Vec<String>)>) -> Self
    where
        K: Into<String>,
    {
        let mut any = false;
        for (name, values) in headers {
            any = true;
            let name = name.into();
            match self
                .multi_headers
                .iter_mut()
                .find(|(n, _)| n.eq_ignore_ascii_case(&name))
            {
                Some(entry) => entry.1.extend(values),
                None => self.multi_headers.push((name, values)),
            }
        }
        if !any {
            self.fail(Error::validation("headers is empty"));
        }
        self
    }

    pub fn build(self) -> Result<RequestOptions> {
        self.finish(Method::GET, PostEncoding::default())
    }

    fn finish(self, method: Method, post_encoding: PostEncoding) -> Result<RequestOptions> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let target = match self.target {
            Some(Target::Url(url)) if !url.is_empty() => Target::Url(url),
            Some(Target::Path(path)) if !path.is_empty() => Target::Path(path),
            _ => return Err(Error::validation("url or path must be set")),
        };

        Ok(RequestOptions {
            method,
            target,
            post_encoding,
            params: (!self.params.is_empty()).then_some(self.params),
            headers: self.headers,
            multi_headers: self.multi_headers,
        })
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// Builder for POST requests. Obtained from [`RequestOptionsBuilder::post`].
#[derive(Debug, Clone)]
pub struct PostOptionsBuilder {
    inner: RequestOptionsBuilder,
    encoding: PostEncoding,
}

impl PostOptionsBuilder {
    pub fn encoding(mut self, encoding: PostEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.inner = self.inner.url(url);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.inner = self.inner.path(path);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.inner = self.inner.param(key, value);
        self
    }

    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Serialize,
    {
        self.inner = self.inner.params(params);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.inner = self.inner.headers(headers);
        self
    }

    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner = self.inner.add_header(name, value);
        self
    }

    pub fn multi_headers<K>(mut self, headers: impl IntoIterator<Item = (K, Vec<String>)>) -> Self
    where
        K: Into<String>,
    {
        self.inner = self.inner.multi_headers(headers);
        self
    }

    pub fn build(self) -> Result<RequestOptions> {
        self.inner.finish(Method::POST, self.encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn build_without_target_fails() {
        let err = RequestOptions::builder().param("id", 7).build().unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let err = RequestOptions::builder().post().build().unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn empty_target_counts_as_missing() {
        let err = RequestOptions::builder().path("").build().unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn defaults_to_get() {
        let options = RequestOptions::builder().path("users").build().unwrap();
        assert_eq!(options.method(), Method::GET);
        assert_eq!(options.target(), &Target::Path("users".to_string()));
        assert!(!options.is_full_url());
        assert!(options.params().is_none());
    }

    #[test]
    fn later_target_replaces_earlier() {
        let options = RequestOptions::builder()
            .path("users")
            .url("https://example.com/x")
            .build()
            .unwrap();
        assert_eq!(options.target(), &Target::Url("https://example.com/x".to_string()));
        assert!(options.is_full_url());
    }

    #[test]
    fn post_builder_carries_encoding() {
        let options = RequestOptions::builder()
            .url("https://example.com/users")
            .post()
            .encoding(PostEncoding::Form)
            .param("name", "alice")
            .build()
            .unwrap();
        assert_eq!(options.method(), Method::POST);
        assert_eq!(options.post_encoding(), PostEncoding::Form);
    }

    #[test]
    fn post_encoding_defaults_to_json() {
        let options = RequestOptions::builder().path("a").post().build().unwrap();
        assert_eq!(options.post_encoding(), PostEncoding::Json);
    }

    #[test]
    fn params_keep_insertion_order() {
        let options = RequestOptions::builder()
            .path("search")
            .param("q", "rust")
            .param("page", 2)
            .param("exact", true)
            .build()
            .unwrap();
        let keys: Vec<_> = options.params().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["q", "page", "exact"]);
    }

    #[test]
    fn empty_param_set_fails() {
        let empty: HashMap<String, String> = HashMap::new();
        let err = RequestOptions::builder().path("a").params(empty).build().unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn empty_header_sets_fail() {
        let empty: Vec<(String, String)> = Vec::new();
        let err = RequestOptions::builder().path("a").headers(empty).build().unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let empty: Vec<(String, Vec<String>)> = Vec::new();
        let err = RequestOptions::builder()
            .path("a")
            .post()
            .multi_headers(empty)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn null_param_fails() {
        let err = RequestOptions::builder()
            .path("a")
            .param("missing", None::<String>)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn non_json_param_fails_with_json_error() {
        let mut odd = HashMap::new();
        odd.insert((1, 2), "tuple keys are not JSON object keys");
        let err = RequestOptions::builder()
            .path("a")
            .post()
            .param("odd", odd)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Json { .. }));
    }

    #[test]
    fn first_error_wins() {
        let empty: Vec<(String, String)> = Vec::new();
        let err = RequestOptions::builder()
            .param("missing", None::<u8>)
            .headers(empty)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn single_headers_overwrite() {
        let options = RequestOptions::builder()
            .path("a")
            .header("Accept", "text/plain")
            .headers([("accept", "application/json"), ("X-Trace", "1")])
            .build()
            .unwrap();
        assert_eq!(
            options.headers(),
            &[
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Trace".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn multi_headers_append() {
        let options = RequestOptions::builder()
            .path("a")
            .add_header("Cookie", "a=1")
            .multi_headers([("cookie", vec!["b=2".to_string()])])
            .add_header("Cookie", "c=3")
            .build()
            .unwrap();
        assert_eq!(
            options.multi_headers(),
            &[(
                "Cookie".to_string(),
                vec!["a=1".to_string(), "b=2".to_string(), "c=3".to_string()]
            )]
        );
    }
}
