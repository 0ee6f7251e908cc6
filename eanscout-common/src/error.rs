//! Common error types for eanscout

use thiserror::Error;

/// Common result type for eanscout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the resolution core and its HTTP boundary
#[derive(Error, Debug)]
pub enum Error {
    /// Input could not be normalized to a 13-digit EAN
    #[error("Invalid EAN: {0}")]
    InvalidEan(String),

    /// Adapter key with no registered constructor
    #[error("Unsupported site kind: {0}")]
    UnsupportedSiteKind(String),

    /// No product stored under this EAN
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// No image with this id (or not owned by the given EAN)
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// Unknown or already swept task id
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Persistence failure (wraps sqlx::Error)
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Network or decode failure while fetching a product image
    #[error("Image acquisition failed: {0}")]
    Acquisition(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
