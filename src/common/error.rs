use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("Robot {robot_id} is under maintenance")]
    Maintenance { robot_id: i64 },

    #[error("No robot available: {reason}")]
    Unavailable { reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation error: {reason}")]
    Validation { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Repository error: {0}")]
    Repository(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        DomainError::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        DomainError::Validation {
            reason: reason.into(),
        }
    }

    /// Errors a caller may retry later (with backoff) without changing its input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::Maintenance { .. }
                | DomainError::Unavailable { .. }
                | DomainError::Transport(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
pub type ApplicationResult<T> = Result<T, ApplicationError>;
