use thiserror::Error;

/// A message-channel failure (spec §4.A): always fatal to the owning
/// client's connection.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("peer closed the channel")]
    Closed,
    #[error("truncated read: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("handle count mismatch: expected {expected}, got {got}")]
    HandleCountMismatch { expected: usize, got: usize },
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("message encoding error: {0}")]
    Encoding(String),
}
