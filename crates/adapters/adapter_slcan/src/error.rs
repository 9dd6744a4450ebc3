//! SLCAN adapter error types.

/// Errors specific to the SLCAN adapter.
#[derive(Debug, thiserror::Error)]
pub enum SlcanError {
    /// Socket-level failure while connecting, reading or writing.
    #[error("SLCAN socket error")]
    Io(#[from] std::io::Error),

    /// A write was attempted while no connection is established.
    #[error("not connected to the SLCAN interface")]
    NotConnected,
}

/// Details about why an SLCAN line could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum SlcanParseError {
    /// A line starting with a character no SLCAN frame type uses.
    #[error("unknown SLCAN frame type {prefix:?}")]
    UnknownFrameType { prefix: char },

    /// An extended frame line shorter than identifier plus length.
    #[error("extended frame line too short ({len} chars)")]
    TooShort { len: usize },

    /// A non-hex character where hex digits were expected.
    #[error("invalid hex in {field}")]
    InvalidHex { field: &'static str },

    /// A data length code above the CAN maximum of 8.
    #[error("invalid data length code {dlc}")]
    InvalidLength { dlc: usize },

    /// Fewer or more data characters than the length code announces.
    #[error("length code {dlc} does not match {hex_chars} data chars")]
    DataLengthMismatch { dlc: usize, hex_chars: usize },
}
