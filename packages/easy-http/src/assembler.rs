//! Turns [`RequestOptions`] into a [`RequestDescriptor`].
//!
//! The descriptor keeps the resolved URL as text. Parsing it into a
//! [`url::Url`] happens when a call creates its transport request, so a
//! malformed URL surfaces as that call's creation error.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::options::{Params, RequestOptions, Target};
use crate::types::{HttpRequest, Method, PostEncoding, QueryEncoding, RequestBody};

/// A fully assembled request template. Shared read-only between calls.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<RequestBody>,
}

impl RequestDescriptor {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Build the transport request. Fails if the resolved URL does not parse.
    pub fn to_request(&self) -> Result<HttpRequest> {
        let url = Url::parse(&self.url)?;
        Ok(HttpRequest {
            method: self.method,
            url,
            headers: self.headers.clone(),
            body: self.body.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RequestAssembler {
    base_url: Url,
    query_encoding: QueryEncoding,
}

impl RequestAssembler {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            query_encoding: QueryEncoding::default(),
        }
    }

    pub fn with_query_encoding(mut self, query_encoding: QueryEncoding) -> Self {
        self.query_encoding = query_encoding;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn assemble(&self, options: &RequestOptions) -> Result<RequestDescriptor> {
        let mut url = self.resolve_url(options.target());

        let body = match options.method() {
            Method::GET => {
                if let Some(params) = options.params() {
                    url.push(if url.contains('?') { '&' } else { '?' });
                    url.push_str(&self.query_string(params));
                }
                None
            }
            Method::POST => Some(post_body(options)?),
        };

        let headers = build_headers(options)?;

        Ok(RequestDescriptor {
            method: options.method(),
            url,
            headers,
            body,
        })
    }

    fn resolve_url(&self, target: &Target) -> String {
        match target {
            Target::Url(url) => url.clone(),
            Target::Path(path) => {
                let base = self.base_url.as_str();
                if base.ends_with('/') {
                    format!("{base}{}", path.trim_start_matches('/'))
                } else {
                    format!("{base}{path}")
                }
            }
        }
    }

    fn query_string(&self, params: &Params) -> String {
        match self.query_encoding {
            QueryEncoding::Raw => params
                .iter()
                .map(|(key, value)| format!("{key}={}", value_to_string(value)))
                .collect::<Vec<_>>()
                .join("&"),
            QueryEncoding::Encoded => {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (key, value) in params {
                    serializer.append_pair(key, &value_to_string(value));
                }
                serializer.finish()
            }
        }
    }
}

fn post_body(options: &RequestOptions) -> Result<RequestBody> {
    let Some(params) = options.params() else {
        return Ok(match options.post_encoding() {
            PostEncoding::Json => RequestBody::json(""),
            PostEncoding::Form => RequestBody::form(std::iter::empty()),
        });
    };

    match options.post_encoding() {
        PostEncoding::Json => {
            let text = serde_json::to_string(&Value::Object(params.clone()))?;
            Ok(RequestBody::json(text))
        }
        PostEncoding::Form => {
            let mut pairs = Vec::with_capacity(params.len());
            for (key, value) in params {
                match value {
                    Value::String(s) => pairs.push((key.as_str(), s.as_str())),
                    _ => {
                        return Err(Error::validation(format!(
                            "form value for '{key}' must be a string"
                        )))
                    }
                }
            }
            Ok(RequestBody::form(pairs))
        }
    }
}

fn build_headers(options: &RequestOptions) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (name, value) in options.headers() {
        let (name, value) = header_pair(name, value)?;
        headers.insert(name, value);
    }

    for (name, values) in options.multi_headers() {
        if values.is_empty() {
            return Err(Error::validation(format!("no values for header '{name}'")));
        }
        for value in values {
            let (name, value) = header_pair(name, value)?;
            headers.append(name, value);
        }
    }

    Ok(headers)
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    if name.is_empty() {
        return Err(Error::validation("header name is empty"));
    }
    if value.is_empty() {
        return Err(Error::validation(format!("value for header '{name}' is empty")));
    }
    Ok((
        HeaderName::try_from(name)?,
        HeaderValue::try_from(value)?,
    ))
}

/// Strings are used as-is; everything else uses its JSON text.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
