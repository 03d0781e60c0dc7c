use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sequence, GOP, picture or extension header failed validation.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// Slice data could not be decoded; macroblocks decoded before the
    /// failure stay in the destination frame.
    #[error("Malformed slice: {0}")]
    MalformedSlice(String),

    /// The stream asks for a coding mode this decoder does not implement.
    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),
}

pub type Result<T> = std::result::Result<T, DecoderError>;

pub(crate) fn header_err<T>(msg: impl Into<String>) -> Result<T> {
    Err(DecoderError::MalformedHeader(msg.into()))
}

pub(crate) fn slice_err<T>(msg: impl Into<String>) -> Result<T> {
    Err(DecoderError::MalformedSlice(msg.into()))
}
