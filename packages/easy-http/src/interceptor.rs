//! Request interceptors run by the transport just before a request is sent.
//!
//! [`DomainRouter`] handles the reserved `Domain-Name` header: the header
//! value names an entry in a table of base URLs, and the request's scheme,
//! host and port are replaced with that entry's. Path and query are kept.

use std::collections::HashMap;

use url::Url;

use crate::error::{Error, Result};
use crate::types::HttpRequest;

/// Reserved header naming the base URL a request should be routed to.
pub const DOMAIN_NAME_HEADER: &str = "Domain-Name";

pub trait Interceptor: Send + Sync {
    /// Inspect or rewrite a request. An error fails the call.
    fn intercept(&self, request: HttpRequest) -> Result<HttpRequest>;
}

#[derive(Debug, Clone, Default)]
pub struct DomainRouter {
    base_urls: HashMap<String, Url>,
}

impl DomainRouter {
    /// Parse a table of textual base URLs.
    pub fn parse<K, V>(base_urls: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        let base_urls = base_urls
            .into_iter()
            .map(|(name, url)| {
                let url = url.as_ref();
                Url::parse(url)
                    .map(|parsed| (name.into(), parsed))
                    .map_err(|e| Error::validation(format!("Illegal URL '{url}': {e}")))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { base_urls })
    }

    pub fn is_empty(&self) -> bool {
        self.base_urls.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Url> {
        self.base_urls.get(name)
    }
}

impl Interceptor for DomainRouter {
    fn intercept(&self, mut request: HttpRequest) -> Result<HttpRequest> {
        let names: Vec<String> = request
            .header_values(DOMAIN_NAME_HEADER)
            .into_iter()
            .map(str::to_string)
            .collect();

        let name = match names.as_slice() {
            [] => return Ok(request),
            [name] => name,
            _ => {
                return Err(Error::validation(format!(
                    "Only one {DOMAIN_NAME_HEADER} header is allowed"
                )))
            }
        };

        if self.base_urls.is_empty() {
            return Err(Error::invalid_state(format!(
                "{DOMAIN_NAME_HEADER} header present but no named base URLs are configured"
            )));
        }

        let target = self
            .base_urls
            .get(name)
            .ok_or_else(|| Error::NotFound { name: name.clone() })?;

        tracing::debug!(domain = %name, from = %request.url, to = %target, "routing request");
        rebase(&mut request.url, target)?;
        request.headers.remove(DOMAIN_NAME_HEADER);
        Ok(request)
    }
}

/// Replace scheme, host and port of `url` with those of `target`.
fn rebase(url: &mut Url, target: &Url) -> Result<()> {
    let original = url.to_string();
    let invalid = |what: &str| Error::InvalidUrl {
        message: format!("cannot set {what} of '{original}' from '{target}'"),
    };

    if url.scheme() != target.scheme() {
        url.set_scheme(target.scheme()).map_err(|()| invalid("scheme"))?;
    }
    url.set_host(target.host_str())?;
    url.set_port(target.port()).map_err(|()| invalid("port"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Method;
    use http::header::{HeaderMap, HeaderValue};

    fn request(url: &str, domains: &[&str]) -> HttpRequest {
        let mut headers = HeaderMap::new();
        for domain in domains {
            headers.append(DOMAIN_NAME_HEADER, HeaderValue::from_str(domain).unwrap());
        }
        headers.insert("accept", HeaderValue::from_static("application/json"));
        HttpRequest {
            method: Method::GET,
            url: Url::parse(url).unwrap(),
            headers,
            body: None,
        }
    }

    fn router() -> DomainRouter {
        DomainRouter::parse([
            ("svc-a", "https://a.internal/"),
            ("svc-b", "http://b.internal:9000/ignored/"),
        ])
        .unwrap()
    }

    #[test]
    fn rewrites_scheme_host_and_port() {
        let routed = router()
            .intercept(request("http://api.example.com:8080/v1/users?id=7", &["svc-a"]))
            .unwrap();
        assert_eq!(routed.url.as_str(), "https://a.internal/v1/users?id=7");
        assert!(routed.header(DOMAIN_NAME_HEADER).is_none());
        assert_eq!(routed.header("accept"), Some("application/json"));
    }

    #[test]
    fn keeps_explicit_target_port() {
        let routed = router()
            .intercept(request("https://api.example.com/v1/users", &["svc-b"]))
            .unwrap();
        assert_eq!(routed.url.as_str(), "http://b.internal:9000/v1/users");
    }

    #[test]
    fn requests_without_header_pass_through() {
        let routed = router()
            .intercept(request("https://api.example.com/v1/users", &[]))
            .unwrap();
        assert_eq!(routed.url.as_str(), "https://api.example.com/v1/users");
    }

    #[test]
    fn unknown_name_is_not_found() {
        let err = router()
            .intercept(request("https://api.example.com/", &["svc-z"]))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref name } if name == "svc-z"));
    }

    #[test]
    fn empty_table_is_a_state_error() {
        let err = DomainRouter::default()
            .intercept(request("https://api.example.com/", &["svc-a"]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn repeated_header_is_rejected() {
        let err = router()
            .intercept(request("https://api.example.com/", &["svc-a", "svc-b"]))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn parse_rejects_bad_urls() {
        let err = DomainRouter::parse([("bad", "not a url")]).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
