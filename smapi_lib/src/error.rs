//! Error types for the Synthetic Monitoring API client.

use std::fmt;
use thiserror::Error;

/// Result type returned by every client operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Base error type for Synthetic Monitoring operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The operation needs an access token and the client has none.
    ///
    /// Tokens are obtained with [`Client::install`](crate::Client::install) or
    /// [`Client::init`](crate::Client::init).
    #[error("authorization token required")]
    AuthorizationRequired,

    /// Building or sending the request failed (bad URL, connection refused, timeout).
    #[error("{action}: {source}")]
    Transport {
        action: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A success response whose body does not match the expected shape.
    #[error("{action}, decoding response: {source}")]
    Decode {
        action: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request body could not be encoded as JSON. This should never happen.
    #[error("cannot encode request: {0}")]
    CannotEncodeRequest(#[source] serde_json::Error),

    /// A well-formed response that breaks the API contract, e.g. an empty refreshed token.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{0}")]
    InvalidArgument(String),
}

impl Error {
    pub(crate) fn transport(action: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            action: action.into(),
            source,
        }
    }

    /// Name the operation a transport failure happened in. Other kinds already carry it.
    pub(crate) fn with_action(self, action: &str) -> Self {
        match self {
            Self::Transport { source, .. } => Self::Transport {
                action: action.to_string(),
                source,
            },
            other => other,
        }
    }

    /// HTTP status code of a server error, if this is one.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Http(e) => Some(e.code),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }
}

/// Structured error body sent by the API server: `{"msg": "...", "err": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ApiMessage {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err: String,
}

impl ApiMessage {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.msg.is_empty() && self.err.is_empty()
    }
}

impl fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.msg.is_empty(), self.err.is_empty()) {
            (_, false) => write!(f, "msg=\"{}\" error=\"{}\"", self.msg, self.err),
            (false, true) => write!(f, "msg=\"{}\"", self.msg),
            (true, true) => Ok(()),
        }
    }
}

/// Raised when the API returns a status other than 200 or 202.
///
/// Callers tell "not found", "unauthorized", "conflict" and friends apart by
/// [`code`](Self::code); the taxonomy is not typed any further.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    /// Numeric status, e.g. 404.
    pub code: u16,
    /// Status line text, e.g. `404 Not Found`.
    pub status: String,
    /// What the client was doing, e.g. `probe add request`.
    pub action: String,
    /// Message decoded from the response body, if any.
    pub api: ApiMessage,
}

impl HttpError {
    pub fn new(
        code: u16,
        status: impl Into<String>,
        action: impl Into<String>,
        api: ApiMessage,
    ) -> Self {
        Self {
            code,
            status: status.into(),
            action: action.into(),
            api,
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.api.is_empty() {
            return write!(f, "{}: status=\"{}\"", self.action, self.status);
        }
        write!(
            f,
            "{}: status=\"{}\", msg=\"{}\", err=\"{}\"",
            self.action, self.status, self.api.msg, self.api.err
        )
    }
}
