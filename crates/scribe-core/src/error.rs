use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScribeError {
    /// Bad input shape, e.g. a weekly job without a schedule day.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The site's topic strategy has nothing left to hand out.
    #[error("No topic available for site {site_id}")]
    NoTopicAvailable { site_id: String },

    #[error("Prompt render error: {0}")]
    PromptRender(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Publish error: {0}")]
    Publish(String),

    /// The operation is not legal for the record's current status.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScribeError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ScribeError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Short, stable error code for CLI output and structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            ScribeError::Validation(_) => "VALIDATION",
            ScribeError::NotFound { .. } => "NOT_FOUND",
            ScribeError::AlreadyExists(_) => "ALREADY_EXISTS",
            ScribeError::NoTopicAvailable { .. } => "NO_TOPIC_AVAILABLE",
            ScribeError::PromptRender(_) => "PROMPT_RENDER_ERROR",
            ScribeError::Generation(_) => "GENERATION_ERROR",
            ScribeError::Publish(_) => "PUBLISH_ERROR",
            ScribeError::InvalidState(_) => "INVALID_STATE",
            ScribeError::Cancelled(_) => "CANCELLED",
            ScribeError::Config(_) => "CONFIG_ERROR",
            ScribeError::Database(_) => "DATABASE_ERROR",
            ScribeError::Serialization(_) => "SERIALIZATION_ERROR",
            ScribeError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;
