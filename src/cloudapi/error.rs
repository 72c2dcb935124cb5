//! Control-plane error classification
//!
//! CloudAPI reports failures as JSON bodies carrying a restify-style error
//! code. Responses with a recognized code become typed [`CloudError::Api`]
//! values; anything else stays a transport error and is never reinterpreted
//! as a domain failure.

use serde::Deserialize;
use thiserror::Error;

/// Closed set of error codes the control plane is known to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    InternalError,
    InUseError,
    InvalidArgument,
    InvalidCredentials,
    InvalidHeader,
    InvalidVersion,
    MissingParameter,
    NotAuthorized,
    RequestThrottled,
    RequestTooLarge,
    RequestMoved,
    ResourceNotFound,
    UnknownError,
}

impl ErrorCode {
    /// Parse a code string from a response body. Returns `None` for codes
    /// outside the known set, which keeps unrecognized failures in the
    /// transport class.
    pub fn parse(code: &str) -> Option<Self> {
        let code = match code {
            "BadRequest" => Self::BadRequest,
            "InternalError" => Self::InternalError,
            "InUseError" => Self::InUseError,
            "InvalidArgument" => Self::InvalidArgument,
            "InvalidCredentials" => Self::InvalidCredentials,
            "InvalidHeader" => Self::InvalidHeader,
            "InvalidVersion" => Self::InvalidVersion,
            "MissingParameter" => Self::MissingParameter,
            "NotAuthorized" => Self::NotAuthorized,
            "RequestThrottled" => Self::RequestThrottled,
            "RequestTooLarge" => Self::RequestTooLarge,
            "RequestMoved" => Self::RequestMoved,
            "ResourceNotFound" => Self::ResourceNotFound,
            "UnknownError" => Self::UnknownError,
            _ => return None,
        };

        Some(code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BadRequest",
            Self::InternalError => "InternalError",
            Self::InUseError => "InUseError",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidCredentials => "InvalidCredentials",
            Self::InvalidHeader => "InvalidHeader",
            Self::InvalidVersion => "InvalidVersion",
            Self::MissingParameter => "MissingParameter",
            Self::NotAuthorized => "NotAuthorized",
            Self::RequestThrottled => "RequestThrottled",
            Self::RequestTooLarge => "RequestTooLarge",
            Self::RequestMoved => "RequestMoved",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::UnknownError => "UnknownError",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a control-plane call.
#[derive(Debug, Error)]
pub enum CloudError {
    /// Network or protocol failure. Rethrown unmodified.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Response body that could not be decoded as JSON.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Control-plane response carrying a recognized error code.
    #[error("{code}: {message}")]
    Api {
        code: ErrorCode,
        message: String,
        status: u16,
    },
}

impl CloudError {
    /// Whether this is a classified domain error. Only domain errors are
    /// eligible for a call site's declared fallback value.
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Error body shape the control plane responds with.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Recognize a response body as a classified domain error.
pub fn recognize(body: &str) -> Option<(ErrorCode, String)> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let code = ErrorCode::parse(parsed.code.as_deref()?)?;
    let message = parsed.message.unwrap_or_else(|| code.as_str().to_string());

    Some((code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_codes() {
        let (code, message) =
            recognize(r#"{"code":"ResourceNotFound","message":"no such machine"}"#).unwrap();
        assert_eq!(code, ErrorCode::ResourceNotFound);
        assert_eq!(message, "no such machine");
    }

    #[test]
    fn message_defaults_to_code() {
        let (code, message) = recognize(r#"{"code":"NotAuthorized"}"#).unwrap();
        assert_eq!(code, ErrorCode::NotAuthorized);
        assert_eq!(message, "NotAuthorized");
    }

    #[test]
    fn unknown_codes_stay_unclassified() {
        assert!(recognize(r#"{"code":"SomethingElse","message":"?"}"#).is_none());
        assert!(recognize("not json at all").is_none());
        assert!(recognize(r#"{"message":"no code"}"#).is_none());
    }

    #[test]
    fn domain_classification() {
        let err = CloudError::Api {
            code: ErrorCode::RequestThrottled,
            message: "slow down".to_string(),
            status: 429,
        };
        assert!(err.is_domain());
        assert_eq!(err.code(), Some(ErrorCode::RequestThrottled));

        let decode = CloudError::from(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
        assert!(!decode.is_domain());
        assert_eq!(decode.code(), None);
    }
}
