pub mod collect;
pub mod config;
pub mod export;
pub mod extract;
pub mod highlight;
pub mod keywords;
pub mod matcher;
pub mod progress;
pub mod record;
pub mod report;
pub mod session;
pub mod utils;

// Re-export commonly used types
pub use crate::config::AppConfig;
pub use crate::record::ListingRecord;
pub use crate::utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
