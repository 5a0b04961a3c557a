use std::fmt;

use nexus_core::RequestFailure;
use tokio_tungstenite::tungstenite;

#[derive(Debug)]
pub enum LinkError {
    /// A gateway call failed: transport, timeout, non-2xx status or bad body.
    RequestFailed {
        endpoint: String,
        source: reqwest::Error,
    },
    MalformedMessage(serde_json::Error),
    Channel(tungstenite::Error),
    ChannelClosed,
    Config(String),
}

impl LinkError {
    pub fn request(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        LinkError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::RequestFailed { source, .. } if source.is_timeout())
    }

    /// Display form for the console: this error's message plus its root cause.
    pub fn to_failure(&self) -> RequestFailure {
        let mut cause = String::new();
        let mut next = std::error::Error::source(self);
        while let Some(e) = next {
            cause = e.to_string();
            next = e.source();
        }
        RequestFailure::new(self.to_string(), cause)
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::RequestFailed { endpoint, source } => {
                if source.is_timeout() {
                    write!(f, "request to {endpoint} timed out")
                } else if let Some(status) = source.status() {
                    write!(f, "request to {endpoint} returned {status}")
                } else if source.is_decode() {
                    write!(f, "request to {endpoint} returned an unreadable body")
                } else {
                    write!(f, "request to {endpoint} failed")
                }
            }
            LinkError::MalformedMessage(e) => write!(f, "malformed stream message: {e}"),
            LinkError::Channel(e) => write!(f, "stream channel error: {e}"),
            LinkError::ChannelClosed => write!(f, "stream channel closed"),
            LinkError::Config(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkError::RequestFailed { source, .. } => Some(source),
            LinkError::MalformedMessage(e) => Some(e),
            LinkError::Channel(e) => Some(e),
            LinkError::ChannelClosed | LinkError::Config(_) => None,
        }
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(e: serde_json::Error) -> Self {
        LinkError::MalformedMessage(e)
    }
}

impl From<tungstenite::Error> for LinkError {
    fn from(e: tungstenite::Error) -> Self {
        LinkError::Channel(e)
    }
}

impl From<toml::de::Error> for LinkError {
    fn from(e: toml::de::Error) -> Self {
        LinkError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
