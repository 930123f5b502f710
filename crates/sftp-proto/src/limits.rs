//! `SFTPLimits` (§3, §4.8 v6 `limits@openssh.com`/`LIMITS` extension):
//! server-advertised ceilings a client engine should respect when
//! sizing pipelined reads/writes and open-handle pools (§5).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SftpLimits {
    pub max_packet_len: u64,
    pub max_read_len: u64,
    pub max_write_len: u64,
    pub max_open_handles: u64,
}

impl Default for SftpLimits {
    /// Conservative defaults used until a server-advertised value is
    /// known, matching common real-world server ceilings.
    fn default() -> Self {
        SftpLimits {
            max_packet_len: 256 * 1024,
            max_read_len: 256 * 1024,
            max_write_len: 256 * 1024,
            max_open_handles: 0, // 0 == unknown/unlimited
        }
    }
}
