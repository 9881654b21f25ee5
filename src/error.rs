use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced by the binary shell. The tree engine itself never fails
/// outward; it logs and degrades instead.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from terminal or log file handling.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal initialization or rendering errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Unusable configuration value.
    #[error("Config error: {0}")]
    Config(String),
}
