//! Error types for digest rewriting

use thiserror::Error;

/// Errors that can occur while rewriting a digest message
#[derive(Error, Debug)]
pub enum TransformError {
    /// The HTML body could not be turned into a usable document
    #[error("Failed to parse HTML body: {0}")]
    HtmlParse(String),

    /// A link or host could not be parsed as a URL
    #[error("Invalid URL {url}: {details}")]
    InvalidUrl { url: String, details: String },

    /// Configuration text could not be read
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A raw message could not be decoded
    #[error("Failed to decode message: {0}")]
    Message(String),
}

impl TransformError {
    pub(crate) fn invalid_url(url: &str, details: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            details: details.to_string(),
        }
    }
}

/// Result type for digest rewriting operations
pub type Result<T> = std::result::Result<T, TransformError>;
