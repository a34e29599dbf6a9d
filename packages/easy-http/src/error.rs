use crate::types::HttpResponse;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// Caller misuse caught while building options or assembling a request.
    #[error("Invalid argument: {message}")]
    Validation { message: String },

    #[error("Illegal state: {message}")]
    InvalidState { message: String },

    #[error("No base URL registered for domain name '{name}'")]
    NotFound { name: String },

    #[error("JSON error: {message}")]
    Json { message: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("Invalid header: {message}")]
    InvalidHeader { message: String },

    #[error("HTTP error: {message}")]
    Transport { message: String },

    #[error("Canceled")]
    Canceled,

    /// The request completed but the server answered with a non-2xx status.
    #[error("{}", .response.status_text)]
    ResponseFailed { response: Box<HttpResponse> },

    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Error::InvalidState {
            message: message.into(),
        }
    }

    pub(crate) fn already_executed() -> Self {
        Self::invalid_state("Already executed.")
    }

    /// The unsuccessful response carried by `ResponseFailed`.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Error::ResponseFailed { response } => Some(response),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Transport {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
        }
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(error: http::header::InvalidHeaderName) -> Self {
        Error::InvalidHeader {
            message: error.to_string(),
        }
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(error: http::header::InvalidHeaderValue) -> Self {
        Error::InvalidHeader {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_failed_uses_status_text_as_message() {
        let error = Error::ResponseFailed {
            response: Box::new(HttpResponse {
                status: 404,
                status_text: "Not Found".to_string(),
                headers: Vec::new(),
                body: String::new(),
            }),
        };
        assert_eq!(error.to_string(), "Not Found");
        assert_eq!(error.response().map(|r| r.status), Some(404));
    }

    #[test]
    fn canceled_is_recognised() {
        assert!(Error::Canceled.is_canceled());
        assert!(!Error::already_executed().is_canceled());
        assert!(Error::Canceled.response().is_none());
    }
}
