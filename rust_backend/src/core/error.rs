//! Error types for pipeline operations.
//!
//! Only fatal conditions live here. Upstream unavailability is absorbed by the
//! acquisition fallback chain and data-quality shortfalls are reported as flags,
//! so neither ever reaches a caller as a `PipelineError`.

use std::fmt;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Structured context for pipeline errors.
///
/// Provides additional information about where and why an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "load_config", "score_zone")
    pub operation: Option<String>,
    /// The entity type involved (e.g., "zone", "dataset", "bucket_table")
    pub entity: Option<String>,
    /// The entity ID if applicable
    pub entity_id: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the entity type.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Set the entity ID.
    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid or incomplete configuration (missing bucket table, bad rule, bad bounds).
    #[error("Configuration error: {message} {context}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// A zone polygon that cannot be used for containment tests.
    #[error("Invalid zone: {message} {context}")]
    InvalidZone {
        message: String,
        context: ErrorContext,
    },

    /// A domain invariant was broken (score outside [0,100], negative population).
    #[error("Invariant violation: {message} {context}")]
    InvariantViolation {
        message: String,
        context: ErrorContext,
    },

    /// The terminal synthetic tier could not produce data.
    #[error("Synthetic generator failure: {message} {context}")]
    SyntheticGenerator {
        message: String,
        context: ErrorContext,
    },

    /// The run was cancelled; partial results were discarded.
    #[error("Analysis run cancelled")]
    Cancelled,

    /// Internal/unexpected errors (task join failures, runtime construction).
    #[error("Internal error: {message} {context}")]
    Internal {
        message: String,
        context: ErrorContext,
    },
}

impl PipelineError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a configuration error with context.
    pub fn configuration_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Configuration {
            message: message.into(),
            context,
        }
    }

    /// Create an invalid zone error for the given zone id.
    pub fn invalid_zone(message: impl Into<String>, zone_id: impl ToString) -> Self {
        Self::InvalidZone {
            message: message.into(),
            context: ErrorContext::new("validate_zone")
                .with_entity("zone")
                .with_entity_id(zone_id),
        }
    }

    /// Create an invariant violation.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create an invariant violation with context.
    pub fn invariant_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::InvariantViolation {
            message: message.into(),
            context,
        }
    }

    /// Create a synthetic generator error for a dataset.
    pub fn synthetic(message: impl Into<String>, dataset: &str) -> Self {
        Self::SyntheticGenerator {
            message: message.into(),
            context: ErrorContext::new("generate_synthetic")
                .with_entity("dataset")
                .with_entity_id(dataset),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Whether this error belongs to the configuration class (fatal before any work).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::InvalidZone { .. })
    }

    /// Get the error context, if the variant carries one.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Configuration { context, .. }
            | Self::InvalidZone { context, .. }
            | Self::InvariantViolation { context, .. }
            | Self::SyntheticGenerator { context, .. }
            | Self::Internal { context, .. } => Some(context),
            Self::Cancelled => None,
        }
    }
}


impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Internal {
            message: err.to_string(),
            context: ErrorContext::new("join_dataset_task"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let ctx = ErrorContext::new("score_zone")
            .with_entity("zone")
            .with_entity_id(7)
            .with_details("score=104.2");
        assert_eq!(
            ctx.to_string(),
            "[operation=score_zone, entity=zone, id=7, details=score=104.2]"
        );
    }

    #[test]
    fn test_error_message_includes_context() {
        let err = PipelineError::invalid_zone("ring has fewer than 4 coordinates", 12);
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid zone: ring has fewer than 4 coordinates"));
        assert!(msg.contains("id=12"));
        assert!(err.is_configuration());
        assert_eq!(
            err.context().and_then(|c| c.operation.as_deref()),
            Some("validate_zone")
        );
        assert!(PipelineError::Cancelled.context().is_none());
    }
}
