use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PikError {
    // Input errors: the caller handed us an image we cannot compress, or a
    // decoded header describes an image the caller refuses to accept.
    #[error("Empty image")]
    EmptyImage = 1,
    #[error("Image too wide")]
    ImageTooWide = 2,
    #[error("Image too big")]
    ImageTooBig = 3,

    // Format errors: the bitstream is damaged or not ours.
    #[error("Truncated header")]
    TruncatedHeader = 20,
    #[error("Truncated stream")]
    TruncatedStream = 21,
    #[error("Invalid format code")]
    InvalidFormatCode = 22,
    #[error("Invalid quantization field")]
    InvalidQuantField = 23,
    #[error("Compressed data size mismatch")]
    SizeMismatch = 24,

    // Unsupported operations.
    #[error("Alpha channel not supported")]
    AlphaNotSupported = 40,
    #[error("Not implemented")]
    NotImplemented = 41,
}
