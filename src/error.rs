use std::time::Duration;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum RepurposeError {
    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    #[error("API error from {api}: {message}")]
    Api { api: String, message: String },

    #[error("API JSON error from {api}: {source}")]
    ApiJson {
        api: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("{api} did not respond within {}s", .after.as_secs())]
    Timeout { api: String, after: Duration },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Diagnostic classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Unreachable,
    Status,
    Malformed,
    NotFound,
    Other,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Unreachable => "unreachable",
            Self::Status => "status",
            Self::Malformed => "malformed",
            Self::NotFound => "not_found",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn classify_reqwest(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::Unreachable
    } else if err.is_status() {
        FailureKind::Status
    } else if err.is_decode() {
        FailureKind::Malformed
    } else {
        FailureKind::Other
    }
}

impl RepurposeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Http(err) | Self::HttpClientInit(err) => classify_reqwest(err),
            Self::HttpMiddleware(reqwest_middleware::Error::Reqwest(err)) => classify_reqwest(err),
            Self::HttpMiddleware(_) => FailureKind::Other,
            Self::Api { .. } => FailureKind::Status,
            Self::ApiJson { .. } | Self::Json(_) => FailureKind::Malformed,
            Self::NotFound { .. } => FailureKind::NotFound,
            _ => FailureKind::Other,
        }
    }
}
