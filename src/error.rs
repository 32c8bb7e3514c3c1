use thiserror::Error;

/// Substring the hosted API puts in the message when the selected key/project
/// cannot see the requested model.
pub const ENTITY_NOT_FOUND_SIGNAL: &str = "Requested entity was not found";

#[derive(Error, Debug)]
pub enum StoryboardError {
    #[error("Script analysis failed: {0}")]
    AnalysisFailure(String),

    #[error("Image generation failed: {0}")]
    ImageGenerationFailure(String),

    #[error("Authorization required: {0}")]
    AuthorizationRequired(String),

    #[error("Chat failed: {0}")]
    ChatFailure(String),

    #[error("API error {code} ({status}): {message}")]
    ApiError {
        code: u16,
        status: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid data url: {0}")]
    InvalidDataUrl(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl StoryboardError {
    pub fn api(code: u16, status: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            status: status.into(),
            message: message.into(),
        }
    }

    /// Whether the failure means the caller has to pick a credential again
    /// rather than just retry.
    ///
    /// `UNAUTHENTICATED` and `PERMISSION_DENIED` statuses always count. A plain
    /// `NOT_FOUND` (wrong base url, mistyped model) does not unless the message
    /// carries the entity-not-found signal.
    pub fn indicates_invalid_credential(&self) -> bool {
        match self {
            Self::AuthorizationRequired(_) => true,
            Self::ApiError {
                status, message, ..
            } => {
                matches!(status.as_str(), "UNAUTHENTICATED" | "PERMISSION_DENIED")
                    || message.contains(ENTITY_NOT_FOUND_SIGNAL)
            }
            other => other.to_string().contains(ENTITY_NOT_FOUND_SIGNAL),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoryboardError>;
