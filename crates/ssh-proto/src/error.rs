use thiserror::Error;

/// Codec-level failures: anything that can go wrong decoding or encoding a
/// single SSH message, independent of connection state.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    #[error(transparent)]
    Binrw(#[from] binrw::Error),
}

impl From<std::io::Error> for ProtoError {
    fn from(e: std::io::Error) -> Self {
        ProtoError::Binrw(binrw::Error::Io(e))
    }
}
