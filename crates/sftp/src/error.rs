//! SFTP-level errors (§7): every `STATUS` code the wire can carry maps
//! to one of these, plus the handful of client-local failure modes
//! (connection loss, protocol violations) that never cross the wire.

use sftp_proto::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SftpError {
    #[error("{code}: {message}")]
    Status { code: StatusCode, message: String },
    #[error("connection lost")]
    ConnectionLost,
    #[error("bad message: {0}")]
    BadMessage(String),
    #[error("glob matched no paths")]
    NoMatch,
    #[error(transparent)]
    Packet(#[from] sftp_proto::packet::PacketError),
    #[error(transparent)]
    Attrs(#[from] sftp_proto::attrs::AttrsError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SftpError {
    pub fn from_status(code: StatusCode, message: String) -> SftpError {
        SftpError::Status { code, message }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, SftpError::Status { code: StatusCode::Eof, .. })
    }

    /// The "no such path" flavor that differs by protocol version (§4.9
    /// glob, §7): v3 only has `NoSuchFile`, v4+ distinguishes the two.
    pub fn no_such_path(version: u32) -> SftpError {
        let code = if version >= 4 { StatusCode::NoSuchPath } else { StatusCode::NoSuchFile };
        SftpError::from_status(code, "no such file or directory".into())
    }
}

pub type Result<T> = std::result::Result<T, SftpError>;
