//! Error types for pdflingo library.

use std::io;
use thiserror::Error;

/// Result type alias for pdflingo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during layout, translation and annotation.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No API key is configured for the language service.
    #[error("No API key configured for the language service")]
    MissingCredential,

    /// The language service answered with a failure.
    #[error("{0}")]
    Service(String),

    /// Transport-level failure talking to the language service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service response did not have the expected shape.
    #[error("Invalid service response: {0}")]
    InvalidResponse(String),

    /// The service response carried no output text.
    #[error("No output text returned by the language service")]
    EmptyOutput,

    /// Page number is not part of the loaded document.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Paragraph id is not part of the page.
    #[error("Paragraph {1} not found on page {0}")]
    ParagraphNotFound(u32, String),

    /// Error during rendering (JSON, text, overlay).
    #[error("Rendering error: {0}")]
    Render(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is the global configuration error rather than a
    /// per-paragraph failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::MissingCredential)
    }
}
