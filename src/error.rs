use std::io;
use thiserror::Error;

/// Underlying cause reported by the smart card layer.
pub type TransportSource = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type for the `ykneo` library.
#[derive(Error, Debug)]
pub enum NeoError {
    #[error("No smart card reader found. Is the YubiKey NEO inserted?")]
    NoReaderAvailable,

    #[error("Establishing the PC/SC context failed: {0}")]
    ContextFailure(#[source] TransportSource),

    #[error("Listing smart card readers failed: {0}")]
    ReaderListFailure(#[source] TransportSource),

    #[error("Connecting to the card failed: {0}")]
    ConnectFailure(#[source] TransportSource),

    #[error("Transmitting APDU failed: {0}")]
    TransmitFailure(#[source] TransportSource),

    #[error("Releasing the card session failed: {0}")]
    ReleaseFailure(#[source] TransportSource),

    #[error("Truncated response: expected at least {expected} bytes, got {actual}")]
    TruncatedResponse { expected: usize, actual: usize },

    #[error("Invalid USB operation mode: {0}")]
    InvalidMode(String),

    #[error("Program sequence mismatch: expected {expected}, device reports {observed}")]
    SequenceMismatch { expected: u16, observed: u8 },

    #[error("APDU data too long: at most {max} bytes, got {actual}")]
    FrameOverflow { max: usize, actual: usize },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl NeoError {
    /// Failures of the reader and card layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            NeoError::NoReaderAvailable
                | NeoError::ContextFailure(_)
                | NeoError::ReaderListFailure(_)
                | NeoError::ConnectFailure(_)
                | NeoError::TransmitFailure(_)
                | NeoError::ReleaseFailure(_)
        )
    }
}
