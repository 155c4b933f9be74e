use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid selector: {selector}")]
    Selector { selector: String },

    #[error("Report error: {0}")]
    Report(String),
}

// AppError can be converted to anyhow::Error via Display implementation

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
