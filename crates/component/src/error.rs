//! Component failure type.

use palisade_core::ErrorKind;
use serde_json::Value;

/// A classified failure raised by a component or a runner on its behalf.
///
/// Every failure carries exactly one [`ErrorKind`] from the closed taxonomy.
/// The runtime decides retry and the orchestrator decides routing from the
/// kind alone.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ComponentError {
    /// Human-readable message, surfaced in trace events and run failures.
    pub message: String,
    /// Taxonomy classification.
    pub kind: ErrorKind,
    /// Optional structured details (bounded by the spill threshold when
    /// persisted).
    pub details: Option<Value>,
}

impl ComponentError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            details: None,
        }
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Connection-level failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// Deadline exceeded.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Upstream rate limiting.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    /// Upstream server-side failure.
    pub fn service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Service, message)
    }

    /// Container runner failure.
    pub fn container(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Container, message)
    }

    /// Credential failure.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Missing entity.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Input validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Unusable configuration.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Missing permission.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    /// Cancelled execution.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "execution cancelled")
    }

    /// Unclassified failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Returns `true` if a retry policy may apply to this failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<serde_json::Error> for ComponentError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Validation, format!("malformed payload: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn constructor_sets_kind() {
        assert_eq!(ComponentError::network("down").kind, ErrorKind::Network);
        assert_eq!(ComponentError::timeout("slow").kind, ErrorKind::Timeout);
        assert_eq!(ComponentError::validation("bad").kind, ErrorKind::Validation);
        assert_eq!(ComponentError::cancelled().kind, ErrorKind::Cancelled);
        assert_eq!(ComponentError::internal("boom").kind, ErrorKind::Internal);
    }

    #[test]
    fn display_carries_kind_and_message() {
        let err = ComponentError::authentication("token expired");
        assert_eq!(err.to_string(), "AuthenticationError: token expired");
    }

    #[test]
    fn details_attach() {
        let err = ComponentError::service("502")
            .with_details(serde_json::json!({"status": 502, "body": "bad gateway"}));
        assert_eq!(err.details.unwrap()["status"], 502);
    }

    #[test]
    fn retryability_follows_kind() {
        assert!(ComponentError::network("x").is_retryable());
        assert!(ComponentError::rate_limit("x").is_retryable());
        assert!(!ComponentError::validation("x").is_retryable());
        assert!(!ComponentError::permission("x").is_retryable());
        assert!(!ComponentError::cancelled().is_retryable());
    }

    #[test]
    fn serde_error_degrades_to_validation() {
        let serde_err = serde_json::from_str::<String>("{").unwrap_err();
        let err = ComponentError::from(serde_err);
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.starts_with("malformed payload"));
    }
}
