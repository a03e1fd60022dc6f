use thiserror::Error;

/// Rejection of a risk-level value. Never coerced; always surfaced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} = {value} is not one of {allowed:?}")]
    OutOfSet {
        field: &'static str,
        value: u32,
        allowed: &'static [u32],
    },

    #[error("{field} is missing")]
    Missing { field: &'static str },

    #[error("{field} must be a whole number, got {raw}")]
    NonNumeric { field: &'static str, raw: String },
}

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Template '{template_id}' not found")]
    TemplateNotFound { template_id: String },

    #[error("Template '{template_id}' belongs to company '{owner}', not '{requested}'")]
    CompanyMismatch {
        template_id: String,
        owner: String,
        requested: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ControlResult<T> = Result<T, ControlError>;
