use thiserror::Error;

/// Errors that reach the caller of the grading engine instead of being
/// folded into an execution outcome.
#[derive(Debug, Error)]
pub enum GraderError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidConfig { key: &'static str, value: String },
}

pub type GraderResult<T> = std::result::Result<T, GraderError>;
