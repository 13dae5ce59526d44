use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
}

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
