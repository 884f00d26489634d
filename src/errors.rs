use thiserror::Error;

/// Unified error type for every service and API operation.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable identity was presented, or the profile is no longer active
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Why the caller could not be identified
        message: String,
    },

    /// The caller is identified but lacks the capability for this operation
    #[error("Forbidden: {message}")]
    Forbidden {
        /// The capability that was missing
        message: String,
    },

    /// Entity missing (or hidden from the caller)
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"report"`
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Input rejected by a business rule
    #[error("Validation failed: {message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// Amount that is zero, negative or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// Offending amount
        amount: f64,
    },

    /// Status change not allowed from the current state
    #[error("Invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        /// Entity kind
        entity: &'static str,
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// Allocation larger than the source balance under strict enforcement
    #[error("Budget exceeded: available {available:.2}, requested {requested:.2}")]
    BudgetExceeded {
        /// Balance available at the source
        available: f64,
        /// Amount requested
        requested: f64,
    },

    /// Outgoing inventory movement larger than the stock
    #[error("Insufficient stock: available {available}, requested {requested}")]
    InsufficientStock {
        /// Units on hand
        available: i64,
        /// Units requested
        requested: i64,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Stable machine-readable code used in API error envelopes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation { .. } | Self::InvalidAmount { .. } => "VALIDATION",
            Self::InvalidTransition { .. }
            | Self::BudgetExceeded { .. }
            | Self::InsufficientStock { .. } => "CONFLICT",
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_follow_taxonomy() {
        assert_eq!(
            Error::Unauthorized {
                message: "missing identity".to_string()
            }
            .code(),
            "UNAUTHORIZED"
        );
        assert_eq!(Error::not_found("report", 7).code(), "NOT_FOUND");
        assert_eq!(Error::validation("bad").code(), "VALIDATION");
        assert_eq!(Error::InvalidAmount { amount: -1.0 }.code(), "VALIDATION");
        assert_eq!(
            Error::BudgetExceeded {
                available: 1.0,
                requested: 2.0
            }
            .code(),
            "CONFLICT"
        );
        assert_eq!(
            Error::Database(sea_orm::DbErr::Custom("boom".to_string())).code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("activity", 42);
        assert_eq!(err.to_string(), "activity not found: 42");
    }
}
