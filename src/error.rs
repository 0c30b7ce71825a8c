use thiserror::Error;

/// Errors returned by the switcher library.
#[derive(Debug, Error)]
pub enum Error {
    /// The byte stream could not be opened.
    #[error("connection error: {0}")]
    Connection(String),

    /// The device address is malformed.
    #[error("invalid device address: {0}")]
    InvalidAddress(String),

    /// Requested input is outside 1-6.
    #[error("input {0} out of range 1-6")]
    InvalidInput(u8),

    /// No live connection to deliver a command on.
    #[error("not connected")]
    NotConnected,

    /// The IO task did not acknowledge a request in time.
    #[error("timed out waiting for the IO task")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, Error>;
