//! Client-facing error taxonomy
//!
//! Every failure that leaves the gateway goes through [`GatewayError`], and
//! every `GatewayError` has exactly one [`ErrorDescriptor`]: a stable code, a
//! readable message and a coarse category clients can branch on.

use std::fmt;

use async_graphql::ErrorExtensions;

use crate::services::rpc::{RpcError, RpcStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Validation,
    Transient,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "NOT_FOUND",
            ErrorCategory::Validation => "VALIDATION",
            ErrorCategory::Transient => "TRANSIENT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translated form of a failure
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorDescriptor {
    pub code: &'static str,
    pub message: String,
    pub category: ErrorCategory,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Service temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Input rejected before any remote call
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// Translate into the client-facing triple.
    pub fn describe(&self) -> ErrorDescriptor {
        let (code, category) = match self {
            GatewayError::NotFound(_) => ("RESOURCE_NOT_FOUND", ErrorCategory::NotFound),
            GatewayError::AlreadyExists(_) => ("RESOURCE_ALREADY_EXISTS", ErrorCategory::Validation),
            GatewayError::InvalidArgument(_) => ("INVALID_ARGUMENT", ErrorCategory::Validation),
            GatewayError::PreconditionFailed(_) => ("PRECONDITION_FAILED", ErrorCategory::Validation),
            GatewayError::Unauthenticated(_) => ("AUTHENTICATION_FAILED", ErrorCategory::Validation),
            GatewayError::PermissionDenied(_) => ("PERMISSION_DENIED", ErrorCategory::Validation),
            GatewayError::Unavailable(_) => ("SERVICE_UNAVAILABLE", ErrorCategory::Transient),
            GatewayError::Timeout(_) => ("TIMEOUT", ErrorCategory::Transient),
            GatewayError::Validation(_) => ("VALIDATION_ERROR", ErrorCategory::Validation),
            GatewayError::Internal(_) => ("INTERNAL_ERROR", ErrorCategory::Internal),
        };

        let message = match self {
            // Internal details stay in the logs
            GatewayError::Internal(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        };

        ErrorDescriptor {
            code,
            message,
            category,
        }
    }

    pub fn code(&self) -> &'static str {
        self.describe().code
    }

    /// Classify a backend rejection (a `success = false` reply).
    pub fn rejected(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if lowered.contains("not found") {
            GatewayError::NotFound(message)
        } else if lowered.contains("already exists") {
            GatewayError::AlreadyExists(message)
        } else {
            GatewayError::PreconditionFailed(message)
        }
    }
}

impl From<RpcError> for GatewayError {
    fn from(e: RpcError) -> Self {
        let detail = if e.message.is_empty() {
            format!("{} returned {}", e.service, e.status)
        } else {
            e.message
        };
        match e.status {
            RpcStatus::NotFound => GatewayError::NotFound(detail),
            RpcStatus::AlreadyExists => GatewayError::AlreadyExists(detail),
            RpcStatus::InvalidArgument => GatewayError::InvalidArgument(detail),
            RpcStatus::FailedPrecondition => GatewayError::PreconditionFailed(detail),
            RpcStatus::Unauthenticated => GatewayError::Unauthenticated(detail),
            RpcStatus::PermissionDenied => GatewayError::PermissionDenied(detail),
            RpcStatus::Unavailable => GatewayError::Unavailable(detail),
            RpcStatus::DeadlineExceeded => GatewayError::Timeout(detail),
            RpcStatus::Internal | RpcStatus::Unknown => GatewayError::Internal(detail),
        }
    }
}

impl ErrorExtensions for GatewayError {
    fn extend(&self) -> async_graphql::Error {
        let descriptor = self.describe();
        async_graphql::Error::new(descriptor.message).extend_with(|_, e| {
            e.set("code", descriptor.code);
            e.set("category", descriptor.category.as_str());
            e.set("timestamp", chrono::Utc::now().timestamp_millis());
        })
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn rpc(status: RpcStatus) -> GatewayError {
        RpcError::new("book-service", status, "boom").into()
    }

    #[test]
    fn test_rpc_statuses_translate_to_codes_and_categories() {
        let cases = [
            (RpcStatus::NotFound, "RESOURCE_NOT_FOUND", ErrorCategory::NotFound),
            (RpcStatus::AlreadyExists, "RESOURCE_ALREADY_EXISTS", ErrorCategory::Validation),
            (RpcStatus::InvalidArgument, "INVALID_ARGUMENT", ErrorCategory::Validation),
            (RpcStatus::FailedPrecondition, "PRECONDITION_FAILED", ErrorCategory::Validation),
            (RpcStatus::Unauthenticated, "AUTHENTICATION_FAILED", ErrorCategory::Validation),
            (RpcStatus::PermissionDenied, "PERMISSION_DENIED", ErrorCategory::Validation),
            (RpcStatus::Unavailable, "SERVICE_UNAVAILABLE", ErrorCategory::Transient),
            (RpcStatus::DeadlineExceeded, "TIMEOUT", ErrorCategory::Transient),
            (RpcStatus::Internal, "INTERNAL_ERROR", ErrorCategory::Internal),
            (RpcStatus::Unknown, "INTERNAL_ERROR", ErrorCategory::Internal),
        ];

        for (status, code, category) in cases {
            let descriptor = rpc(status).describe();
            assert_eq!((descriptor.code, descriptor.category), (code, category), "{status}");
        }
    }

    #[test]
    fn test_validation_error_code() {
        let descriptor = GatewayError::Validation("limit: must be between 1 and 100".into()).describe();
        assert_eq!(descriptor.code, "VALIDATION_ERROR");
        assert_eq!(descriptor.message, "Validation failed: limit: must be between 1 and 100");
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let descriptor = GatewayError::Internal("stack trace".into()).describe();
        assert_eq!(descriptor.message, "An unexpected error occurred");
    }

    #[test]
    fn test_unavailable_message_names_the_cause() {
        let descriptor = rpc(RpcStatus::Unavailable).describe();
        assert_eq!(descriptor.message, "Service temporarily unavailable: boom");
    }

    #[test]
    fn test_rejections_are_classified_by_message() {
        assert_matches!(GatewayError::rejected("Book not found"), GatewayError::NotFound(_));
        assert_matches!(
            GatewayError::rejected("User with this email already exists"),
            GatewayError::AlreadyExists(_)
        );
        assert_matches!(
            GatewayError::rejected("Book is not available for borrowing"),
            GatewayError::PreconditionFailed(_)
        );
    }

    #[test]
    fn test_graphql_error_carries_extensions() {
        let err = GatewayError::NotFound("Book not found".into()).extend();
        let extensions = err.extensions.expect("extensions set");
        assert_eq!(
            extensions.get("code"),
            Some(&async_graphql::Value::from("RESOURCE_NOT_FOUND"))
        );
        assert_eq!(
            extensions.get("category"),
            Some(&async_graphql::Value::from("NOT_FOUND"))
        );
        assert!(extensions.get("timestamp").is_some());
    }
}
