use thiserror::Error;

pub type OfferResult<T> = Result<T, OfferError>;

#[derive(Error, Debug)]
pub enum OfferError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot reach offer store: {0}")]
    Connection(String),

    #[error("Schema validation failed on `{field}`: {reason}")]
    SchemaValidation { field: String, reason: String },

    #[error("Smart rule priority {0} is already in use")]
    DuplicatePriority(u32),

    #[error("Offer `{0}` already exists")]
    DuplicateOfferId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Index `{0}` already exists")]
    IndexExists(String),

    #[error("Failed to create index `{index}`: {reason}")]
    IndexCreation { index: String, reason: String },

    #[error("Offer store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("BSON error: {0}")]
    Bson(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OfferError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        OfferError::SchemaValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Connection-level failures abort a run; everything else is recorded
    /// against the document or index that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OfferError::Connection(_) | OfferError::Config(_))
    }
}
