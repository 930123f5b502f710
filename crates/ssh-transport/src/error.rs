use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("banner line exceeded 255 octets")]
    BannerTooLong,

    #[error("too many non-SSH lines before the version banner")]
    TooManyPreambleLines,

    #[error("peer banner is not a supported SSH protocol version: {0}")]
    UnsupportedProtocolVersion(String),

    #[error("packet padding length {0} is invalid")]
    InvalidPadding(u8),

    #[error("packet length {0} exceeds the configured maximum")]
    PacketTooLarge(u32),

    #[error("MAC verification failed")]
    MacMismatch,

    #[error(transparent)]
    Proto(#[from] ssh_proto::ProtoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
