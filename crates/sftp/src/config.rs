//! SFTP-level configuration (§0.4): the max protocol version either side
//! will offer, and the path-encoding policy.
//!
//! Unlike `asyncssh.sftp`, which lets a caller pick an arbitrary
//! `path_encoding`/`errors` pair and hand back `bytes` for anything that
//! doesn't decode cleanly, every path-bearing field in this workspace's
//! `sftp_proto` types is a Rust `String`. There is no decision to defer
//! here: paths are UTF-8, full stop, and a peer that sends non-UTF-8
//! bytes in a path field is a `SftpError::BadMessage`, not a silently
//! preserved byte string.

#[derive(Debug, Clone, Copy)]
pub struct SftpConfig {
    /// Highest protocol version this side will request (client) or
    /// advertise (server). Clamped to [`sftp_proto::MIN_VERSION`,
    /// `sftp_proto::MAX_VERSION`] wherever it's consumed.
    pub max_version: u32,
}

impl Default for SftpConfig {
    fn default() -> Self {
        SftpConfig { max_version: sftp_proto::MAX_VERSION }
    }
}
