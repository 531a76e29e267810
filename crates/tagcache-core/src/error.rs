use thiserror::Error;

/// Core error types for caching operations.
///
/// Only genuine misuse surfaces through this type. Infrastructure failures of
/// a cache adapter are absorbed by the adapter and never reach the caller of a
/// cached operation.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("No active cache context")]
    NoActiveContext,

    #[error("Failed to serialize cached value: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("Failed to deserialize cached value: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("Invalid cacheable operation: {message}")]
    InvalidOperation { message: String },
}

impl CacheError {
    /// Create a new InvalidOperation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Check if this error was caused by a value that cannot round-trip through the codec
    pub fn is_codec_error(&self) -> bool {
        matches!(self, Self::Serialization(_) | Self::Deserialization(_))
    }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
