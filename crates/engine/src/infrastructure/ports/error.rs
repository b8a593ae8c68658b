//! Error types for port operations.

/// Backend call errors with enough context to log and decide on retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Transport failure (connection refused, timeout, ...).
    #[error("Network error calling {path}: {message}")]
    Network { path: String, message: String },

    /// Non-success HTTP status.
    #[error("{path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    /// Entity not found - includes entity type and ID for actionable error messages.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Body could not be decoded.
    #[error("Invalid response from {path}: {message}")]
    InvalidResponse { path: String, message: String },
}

impl ApiError {
    pub fn network(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Network {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn status(path: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            path: path.into(),
            status,
            body: body.into(),
        }
    }

    /// Create a NotFound error with entity type and ID context.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    pub fn invalid_response(path: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidResponse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Network failures, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::NotFound { .. } | Self::InvalidResponse { .. } => false,
        }
    }

    /// Check if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. }) || matches!(self, Self::Status { status: 404, .. })
    }
}
