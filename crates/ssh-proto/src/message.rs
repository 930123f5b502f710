//! Message-type classification (RFC 4253 §12) used by the connection
//! controller's dispatch table (see `ssh_core::connection`). Several
//! ranges are reused by different sub-protocols depending on connection
//! phase, so this module only classifies — it never decodes.

/// The coarse range a message-type byte falls into, mirroring the gating
/// rules the connection controller enforces before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRange {
    /// 1-19: always legal, even mid-KEX.
    Transport,
    /// 20-29: KEXINIT envelope / EXT_INFO.
    KexEnvelope,
    /// 30-49: KEX-method-specific, only legal while a KEX is in progress.
    KexSpecific,
    /// 50-79: user authentication, only legal before OPEN.
    UserAuth,
    /// 80-89: global requests.
    Global,
    /// 90-127: channel multiplexing.
    Channel,
    /// Anything else is reserved/unassigned.
    Reserved,
}

impl MessageRange {
    pub fn of(message_type: u8) -> MessageRange {
        match message_type {
            1..=19 => MessageRange::Transport,
            20..=29 => MessageRange::KexEnvelope,
            30..=49 => MessageRange::KexSpecific,
            50..=79 => MessageRange::UserAuth,
            80..=89 => MessageRange::Global,
            90..=127 => MessageRange::Channel,
            _ => MessageRange::Reserved,
        }
    }
}

/// Reads the first byte of a decrypted payload without consuming it —
/// every dispatch decision starts here.
pub fn peek_type(payload: &[u8]) -> Option<u8> {
    payload.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_match_rfc4253_table() {
        assert_eq!(MessageRange::of(1), MessageRange::Transport);
        assert_eq!(MessageRange::of(20), MessageRange::KexEnvelope);
        assert_eq!(MessageRange::of(30), MessageRange::KexSpecific);
        assert_eq!(MessageRange::of(50), MessageRange::UserAuth);
        assert_eq!(MessageRange::of(80), MessageRange::Global);
        assert_eq!(MessageRange::of(90), MessageRange::Channel);
        assert_eq!(MessageRange::of(127), MessageRange::Channel);
        assert_eq!(MessageRange::of(128), MessageRange::Reserved);
    }
}
