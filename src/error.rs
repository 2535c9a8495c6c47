#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("encode argument out of range: {reason}")]
    EncodeRange { reason: String },

    #[error("malformed segment: {reason}")]
    DecodeMalformed { reason: String },

    #[error("segment checksum mismatch")]
    DecodeChecksum,

    #[error("handshake retries exhausted")]
    HandshakeExhausted,

    #[error("segment retries exhausted during transfer")]
    TransferExhausted,

    #[error("substrate error: {0}")]
    Substrate(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
