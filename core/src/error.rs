use std::fmt;
use thiserror::Error;

/// The error type for dropsign operations
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Only API version `1.0` is supported.
    VersionNotSupported,
    /// Signature method is neither `PLAINTEXT` nor `HMAC-SHA1`.
    UnknownAuthMethod,
    /// HTTP method the client does not know how to issue.
    UnknownQueryMethod,

    /// The remote API answered with a malformed body.
    ApiError,

    /// HTTP 400, bad input parameter.
    BadInput,
    /// HTTP 401, the token is expired or revoked. Re-authentication is needed.
    ExpiredToken,
    /// HTTP 403, bad OAuth request (wrong consumer key, bad nonce, expired timestamp).
    BadOAuthRequest,
    /// HTTP 404, file or folder not found.
    FileNotFound,
    /// HTTP 405, request method not expected.
    WrongHttpMethod,
    /// HTTP 503, too many requests.
    MaxRequestsExceeded,
    /// HTTP 507, user is over storage quota.
    UserOverQuota,

    /// Transport level failure, or an HTTP failure outside of the API's error table.
    CommunicationError,
    /// A completion arrived that cannot be matched to a known operation.
    ResponseToUnknownRequest,
    /// No completion arrived in time.
    Timeout,

    /// Configuration error (missing fields, invalid values)
    ConfigInvalid,
    /// Unexpected errors
    Unexpected,
}

impl ErrorKind {
    /// Map an HTTP status code onto the API's error table.
    ///
    /// Returns `None` for codes that carry no API specific meaning.
    pub fn from_status(status: u16) -> Option<ErrorKind> {
        match status {
            400 => Some(ErrorKind::BadInput),
            401 => Some(ErrorKind::ExpiredToken),
            403 => Some(ErrorKind::BadOAuthRequest),
            404 => Some(ErrorKind::FileNotFound),
            405 => Some(ErrorKind::WrongHttpMethod),
            503 => Some(ErrorKind::MaxRequestsExceeded),
            507 => Some(ErrorKind::UserOverQuota),
            _ => None,
        }
    }

    /// Check if this kind comes from the remote status code table.
    pub fn is_remote_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::BadInput
                | ErrorKind::ExpiredToken
                | ErrorKind::BadOAuthRequest
                | ErrorKind::FileNotFound
                | ErrorKind::WrongHttpMethod
                | ErrorKind::MaxRequestsExceeded
                | ErrorKind::UserOverQuota
        )
    }

    /// Check if this kind is a protocol error, fatal to the operation.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::VersionNotSupported
                | ErrorKind::UnknownAuthMethod
                | ErrorKind::UnknownQueryMethod
        )
    }
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the human readable message without the kind prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

// Convenience constructors
impl Error {
    /// Create an api error
    pub fn api_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ApiError, message)
    }

    /// Create a communication error
    pub fn communication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CommunicationError, message)
    }

    /// Create an unknown auth method error
    pub fn unknown_auth_method(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownAuthMethod, message)
    }

    /// Create an unknown query method error
    pub fn unknown_query_method(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownQueryMethod, message)
    }

    /// Create a version not supported error
    pub fn version_not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::VersionNotSupported, message)
    }

    /// Create a response to unknown request error
    pub fn response_to_unknown_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResponseToUnknownRequest, message)
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create a config invalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::VersionNotSupported => write!(f, "api version not supported"),
            ErrorKind::UnknownAuthMethod => write!(f, "unknown auth method"),
            ErrorKind::UnknownQueryMethod => write!(f, "unknown query method"),
            ErrorKind::ApiError => write!(f, "unexpected api response"),
            ErrorKind::BadInput => write!(f, "bad input"),
            ErrorKind::ExpiredToken => write!(f, "expired token"),
            ErrorKind::BadOAuthRequest => write!(f, "bad oauth request"),
            ErrorKind::FileNotFound => write!(f, "file not found"),
            ErrorKind::WrongHttpMethod => write!(f, "wrong http method"),
            ErrorKind::MaxRequestsExceeded => write!(f, "max requests exceeded"),
            ErrorKind::UserOverQuota => write!(f, "user over quota"),
            ErrorKind::CommunicationError => write!(f, "communication error"),
            ErrorKind::ResponseToUnknownRequest => write!(f, "response to unknown request"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUriParts> for Error {
    fn from(err: http::uri::InvalidUriParts) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(400, Some(ErrorKind::BadInput))]
    #[test_case(401, Some(ErrorKind::ExpiredToken))]
    #[test_case(403, Some(ErrorKind::BadOAuthRequest))]
    #[test_case(404, Some(ErrorKind::FileNotFound))]
    #[test_case(405, Some(ErrorKind::WrongHttpMethod))]
    #[test_case(503, Some(ErrorKind::MaxRequestsExceeded))]
    #[test_case(507, Some(ErrorKind::UserOverQuota))]
    #[test_case(200, None)]
    #[test_case(302, None)]
    #[test_case(500, None)]
    fn test_from_status(status: u16, expected: Option<ErrorKind>) {
        assert_eq!(ErrorKind::from_status(status), expected);
        if let Some(kind) = expected {
            assert!(kind.is_remote_error());
            assert!(!kind.is_protocol_error());
        }
    }

    #[test]
    fn test_display_carries_kind_and_message() {
        let err = Error::api_error("token response has 1 field");
        assert_eq!(err.kind(), ErrorKind::ApiError);
        assert_eq!(err.message(), "token response has 1 field");
        assert_eq!(
            err.to_string(),
            "unexpected api response: token response has 1 field"
        );
    }
}
