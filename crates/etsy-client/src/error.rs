//! Etsy API errors and status classification

/// Coarse class of a failed Etsy response, used for logging and for the
/// message returned to MCP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// 429: back off and retry later
    RateLimited,
    /// 401/403: token missing, expired or lacking scope
    Unauthorized,
    /// Other 4xx: the request itself is wrong
    Client,
    /// 5xx: Etsy-side failure
    Server,
}

impl ErrorClassification {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorClassification::RateLimited => "rate_limited",
            ErrorClassification::Unauthorized => "unauthorized",
            ErrorClassification::Client => "client",
            ErrorClassification::Server => "server",
        }
    }
}

/// Classify a non-success HTTP status.
pub fn classify_status(status: u16) -> ErrorClassification {
    match status {
        429 => ErrorClassification::RateLimited,
        401 | 403 => ErrorClassification::Unauthorized,
        500..=599 => ErrorClassification::Server,
        _ => ErrorClassification::Client,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No response: DNS, connect, TLS or timeout failure
    #[error("no response from Etsy API: {0}")]
    Http(String),

    #[error("Etsy API error ({status}, {}): {body}", .classification.label())]
    Api {
        status: u16,
        classification: ErrorClassification,
        body: String,
    },

    #[error("unexpected Etsy API response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    pub fn classification(&self) -> Option<ErrorClassification> {
        match self {
            Error::Api { classification, .. } => Some(*classification),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_rate_limit() {
        assert_eq!(classify_status(429), ErrorClassification::RateLimited);
    }

    #[test]
    fn classify_auth_failures() {
        assert_eq!(classify_status(401), ErrorClassification::Unauthorized);
        assert_eq!(classify_status(403), ErrorClassification::Unauthorized);
    }

    #[test]
    fn classify_client_and_server_errors() {
        assert_eq!(classify_status(400), ErrorClassification::Client);
        assert_eq!(classify_status(404), ErrorClassification::Client);
        assert_eq!(classify_status(500), ErrorClassification::Server);
        assert_eq!(classify_status(503), ErrorClassification::Server);
    }

    #[test]
    fn api_error_display_includes_status_class_and_body() {
        let err = Error::Api {
            status: 429,
            classification: ErrorClassification::RateLimited,
            body: "slow down".into(),
        };
        assert_eq!(
            err.to_string(),
            "Etsy API error (429, rate_limited): slow down"
        );
        assert_eq!(err.classification(), Some(ErrorClassification::RateLimited));
    }

    #[test]
    fn transport_errors_have_no_classification() {
        assert_eq!(Error::Http("refused".into()).classification(), None);
    }
}
