use thiserror::Error;

/// Connection-level error taxonomy (§7). Every variant here is fatal: the
/// connection controller sends `DISCONNECT` where feasible and tears down
/// every channel and pending operation exactly once.
#[derive(Debug, Error)]
pub enum Error {
    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("key exchange failed: {0}")]
    KeyExchangeFailed(String),

    #[error("MAC verification failed")]
    MacError,

    #[error("compression error")]
    CompressionError,

    #[error("service not available: {0}")]
    ServiceNotAvailable(String),

    #[error("password change required")]
    PasswordChangeRequired,

    #[error("permission denied")]
    PermissionDenied,

    #[error("host key not verifiable: {0}")]
    HostKeyNotVerifiable(String),

    #[error("illegal user name")]
    IllegalUserName,

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error(transparent)]
    Transport(#[from] ssh_transport::TransportError),

    #[error(transparent)]
    Proto(#[from] ssh_proto::ProtoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
