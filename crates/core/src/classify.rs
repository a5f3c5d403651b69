use std::fmt;

use serde::Serialize;

use crate::transport::TransportFailure;

/// Closed set of user-facing failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    NetworkUnreachable,
    MethodNotAllowed,
    NotFound,
    ServerError,
    ClientError,
    InvalidConfig,
    Unknown,
}

impl ErrorCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkUnreachable => "network-unreachable",
            Self::MethodNotAllowed => "method-not-allowed",
            Self::NotFound => "not-found",
            Self::ServerError => "server-error",
            Self::ClientError => "client-error",
            Self::InvalidConfig => "invalid-config",
            Self::Unknown => "unknown",
        }
    }

    /// Stable message shown to the user for this category.
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NetworkUnreachable => {
                "Cannot reach the assistant service. Please make sure it is running and try again."
            }
            Self::MethodNotAllowed => {
                "The assistant service does not accept this kind of request. Please check the service configuration."
            }
            Self::NotFound => {
                "The assistant service endpoint was not found. Please check the service configuration."
            }
            Self::ServerError => {
                "The assistant service ran into an internal error. Please try again later."
            }
            Self::ClientError => {
                "The assistant service rejected the request. Please rephrase and try again."
            }
            Self::InvalidConfig => {
                "The assistant service sent a response that could not be read. Please check the service configuration."
            }
            Self::Unknown => "An unexpected error occurred. Please try again.",
        }
    }

    /// Maps a non-success HTTP status onto its category.
    pub const fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            500..=599 => Self::ServerError,
            200..=299 => Self::Unknown,
            _ => Self::ClientError,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Normalized, user-safe representation of a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    category: ErrorCategory,
    message: String,
}

impl ClassifiedError {
    fn from_category(category: ErrorCategory) -> Self {
        Self {
            category,
            message: category.user_message().to_string(),
        }
    }

    fn unknown(description: &str) -> Self {
        let description = description.trim();
        if description.is_empty() {
            return Self::from_category(ErrorCategory::Unknown);
        }

        Self {
            category: ErrorCategory::Unknown,
            message: description.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

/// Derives the user-facing category and message for a raw transport failure.
///
/// Total over its input: anything that does not match a known case becomes
/// [`ErrorCategory::Unknown`] carrying the failure's own description.
pub fn classify(failure: &TransportFailure) -> ClassifiedError {
    match failure {
        TransportFailure::Unreachable { .. } => {
            ClassifiedError::from_category(ErrorCategory::NetworkUnreachable)
        }
        TransportFailure::Status { status, .. } => match ErrorCategory::from_status(*status) {
            ErrorCategory::Unknown => {
                ClassifiedError::unknown(&format!("unexpected HTTP status {status}"))
            }
            category => ClassifiedError::from_category(category),
        },
        TransportFailure::InvalidJson { .. } => {
            ClassifiedError::from_category(ErrorCategory::InvalidConfig)
        }
        TransportFailure::Other { details, .. } => ClassifiedError::unknown(details),
    }
}
