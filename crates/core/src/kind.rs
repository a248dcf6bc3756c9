//! The closed error taxonomy.
//!
//! Every activity failure is classified into exactly one [`ErrorKind`];
//! unclassified failures degrade to [`ErrorKind::Internal`]. The orchestrator
//! decides routing, retry and termination from the kind alone — never from
//! stack unwinding.

use serde::{Deserialize, Serialize};

/// Classification of an activity failure.
///
/// Serialized with the `*Error` suffix the wire format uses
/// (e.g. `"NetworkError"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Connection-level failure reaching an external service.
    #[serde(rename = "NetworkError")]
    Network,
    /// An operation exceeded its deadline.
    #[serde(rename = "TimeoutError")]
    Timeout,
    /// An upstream service rejected the call for rate reasons.
    #[serde(rename = "RateLimitError")]
    RateLimit,
    /// An upstream service returned a server-side error.
    #[serde(rename = "ServiceError")]
    Service,
    /// A container runner exited abnormally without producing a result.
    #[serde(rename = "ContainerError")]
    Container,
    /// Credentials were missing, expired, or rejected.
    #[serde(rename = "AuthenticationError")]
    Authentication,
    /// A referenced entity does not exist.
    #[serde(rename = "NotFoundError")]
    NotFound,
    /// Inputs failed schema validation or a required field was unresolved.
    #[serde(rename = "ValidationError")]
    Validation,
    /// The component or node configuration is unusable.
    #[serde(rename = "ConfigurationError")]
    Configuration,
    /// The caller lacks permission for the operation.
    #[serde(rename = "PermissionError")]
    Permission,
    /// Execution was cancelled before completion.
    #[serde(rename = "CancelledError")]
    Cancelled,
    /// Anything that could not be classified.
    #[serde(rename = "InternalError")]
    Internal,
}

impl ErrorKind {
    /// All kinds, in taxonomy order.
    pub const ALL: [Self; 12] = [
        Self::Network,
        Self::Timeout,
        Self::RateLimit,
        Self::Service,
        Self::Container,
        Self::Authentication,
        Self::NotFound,
        Self::Validation,
        Self::Configuration,
        Self::Permission,
        Self::Cancelled,
        Self::Internal,
    ];

    /// The wire tag for this kind (e.g. `"NetworkError"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "NetworkError",
            Self::Timeout => "TimeoutError",
            Self::RateLimit => "RateLimitError",
            Self::Service => "ServiceError",
            Self::Container => "ContainerError",
            Self::Authentication => "AuthenticationError",
            Self::NotFound => "NotFoundError",
            Self::Validation => "ValidationError",
            Self::Configuration => "ConfigurationError",
            Self::Permission => "PermissionError",
            Self::Cancelled => "CancelledError",
            Self::Internal => "InternalError",
        }
    }

    /// Returns `true` if failures of this kind are never retried, regardless
    /// of the component's retry policy.
    #[must_use]
    pub fn is_non_retryable(&self) -> bool {
        matches!(
            self,
            Self::Authentication
                | Self::NotFound
                | Self::Validation
                | Self::Configuration
                | Self::Permission
        )
    }

    /// Returns `true` if a retry policy may apply to this kind.
    ///
    /// Cancellation is neither retryable nor a business failure — it ends the
    /// attempt loop unconditionally.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !self.is_non_retryable() && *self != Self::Cancelled
    }

    /// Parse a wire tag back into a kind.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_retryable_kinds() {
        assert!(ErrorKind::Authentication.is_non_retryable());
        assert!(ErrorKind::NotFound.is_non_retryable());
        assert!(ErrorKind::Validation.is_non_retryable());
        assert!(ErrorKind::Configuration.is_non_retryable());
        assert!(ErrorKind::Permission.is_non_retryable());

        assert!(!ErrorKind::Network.is_non_retryable());
        assert!(!ErrorKind::Timeout.is_non_retryable());
        assert!(!ErrorKind::RateLimit.is_non_retryable());
        assert!(!ErrorKind::Service.is_non_retryable());
        assert!(!ErrorKind::Container.is_non_retryable());
        assert!(!ErrorKind::Internal.is_non_retryable());
    }

    #[test]
    fn cancelled_is_not_retryable() {
        assert!(!ErrorKind::Cancelled.is_retryable());
        assert!(!ErrorKind::Cancelled.is_non_retryable());
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::RateLimit.is_retryable());
        assert!(ErrorKind::Service.is_retryable());
        assert!(ErrorKind::Container.is_retryable());
        assert!(ErrorKind::Internal.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
    }

    #[test]
    fn serde_uses_wire_tags() {
        let json = serde_json::to_string(&ErrorKind::Network).unwrap();
        assert_eq!(json, r#""NetworkError""#);
        let back: ErrorKind = serde_json::from_str(r#""CancelledError""#).unwrap();
        assert_eq!(back, ErrorKind::Cancelled);
    }

    #[test]
    fn serde_roundtrip_all() {
        for kind in ErrorKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            let back: ErrorKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back, "roundtrip failed for {kind}");
        }
    }

    #[test]
    fn display_matches_wire_tag() {
        for kind in ErrorKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn from_tag_roundtrip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::from_tag("NoSuchError"), None);
    }
}
