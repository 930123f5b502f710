//! C7: the connection controller (§4.7). Owns phase transitions, the
//! dispatch-gating rules, rekey policy, and session-id immutability; the
//! actual packet I/O lives in `ssh-transport` and is wired in by the
//! consumer that owns the socket (a CLI, a server listener...).

use std::time::{Duration, Instant};

use ssh_proto::message::MessageRange;

use crate::config::ConnectionConfig;
use crate::channel::ChannelTable;
use crate::error::{Error, Result};
use crate::global_request::{InboundGlobalRequests, OutboundGlobalRequests};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Banner,
    KexInitSent,
    KexInProgress,
    AuthPending,
    AuthInProgress,
    Open,
    Closing,
}

impl Phase {
    fn auth_complete(self) -> bool {
        matches!(self, Phase::Open | Phase::Closing)
    }

    fn newkeys_done(self) -> bool {
        !matches!(self, Phase::Banner | Phase::KexInitSent | Phase::KexInProgress)
    }
}

/// Tracks bytes sent and elapsed time against the configured thresholds
/// (§4.2 rekey policy).
pub struct RekeyPolicy {
    bytes_since_rekey: u64,
    last_rekey: Instant,
    rekey_bytes: u64,
    rekey_interval: Duration,
}

impl RekeyPolicy {
    pub fn new(config: &ConnectionConfig) -> Self {
        RekeyPolicy {
            bytes_since_rekey: 0,
            last_rekey: Instant::now(),
            rekey_bytes: config.rekey_bytes,
            rekey_interval: config.rekey_interval,
        }
    }

    pub fn note_sent(&mut self, len: u64) {
        self.bytes_since_rekey += len;
    }

    pub fn should_rekey(&self) -> bool {
        self.bytes_since_rekey >= self.rekey_bytes || self.last_rekey.elapsed() >= self.rekey_interval
    }

    pub fn reset(&mut self) {
        self.bytes_since_rekey = 0;
        self.last_rekey = Instant::now();
    }
}

/// Login-timeout and keepalive bookkeeping (§4.7 "Timers"). Like
/// [`RekeyPolicy`], this is purely state a caller polls from its own
/// event loop — no task is spawned here, since this crate owns no
/// socket.
pub struct Timers {
    started_at: Instant,
    login_timeout: Option<Duration>,
    keepalive_interval: Option<Duration>,
    keepalive_count_max: u32,
    last_keepalive_sent: Instant,
    consecutive_keepalive_misses: u32,
}

impl Timers {
    pub fn new(config: &ConnectionConfig) -> Self {
        let now = Instant::now();
        Timers {
            started_at: now,
            login_timeout: config.login_timeout,
            keepalive_interval: config.keepalive_interval,
            keepalive_count_max: config.keepalive_count_max,
            last_keepalive_sent: now,
            consecutive_keepalive_misses: 0,
        }
    }

    /// True once `login_timeout` has elapsed with auth still incomplete;
    /// the caller should send DISCONNECT and close.
    pub fn login_timed_out(&self, auth_complete: bool) -> bool {
        !auth_complete
            && self.login_timeout.is_some_and(|timeout| self.started_at.elapsed() >= timeout)
    }

    /// True once `keepalive_interval` has elapsed since the last
    /// keepalive was sent (never, if keepalives are disabled).
    pub fn keepalive_due(&self) -> bool {
        self.keepalive_interval.is_some_and(|interval| self.last_keepalive_sent.elapsed() >= interval)
    }

    /// Call right after sending a `keepalive@openssh.com` global request.
    pub fn note_keepalive_sent(&mut self) {
        self.last_keepalive_sent = Instant::now();
    }

    /// Call when the corresponding reply arrives, resetting the miss
    /// counter.
    pub fn note_keepalive_reply(&mut self) {
        self.consecutive_keepalive_misses = 0;
    }

    /// Call when `keepalive_interval` elapses again with no reply to the
    /// last one. Returns `true` once `keepalive_count_max` consecutive
    /// misses have accrued, meaning the connection is dead.
    pub fn note_keepalive_miss(&mut self) -> bool {
        self.consecutive_keepalive_misses += 1;
        self.consecutive_keepalive_misses >= self.keepalive_count_max
    }
}

/// The process-wide endpoint of one SSH transport (§3 "Connection").
pub struct Connection {
    pub config: ConnectionConfig,
    pub phase: Phase,
    pub session_id: Option<Vec<u8>>,
    pub strict_kex: bool,
    pub channels: ChannelTable,
    pub inbound_global: InboundGlobalRequests,
    pub outbound_global: OutboundGlobalRequests,
    pub rekey: RekeyPolicy,
    pub timers: Timers,
    /// Messages queued while a rekey is in flight (§4.2: only
    /// transport/KEX-envelope/KEX-specific/NEWKEYS may be sent mid-KEX;
    /// everything else waits here and flushes in order after NEWKEYS).
    deferred_outbound: Vec<Vec<u8>>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Connection {
            rekey: RekeyPolicy::new(&config),
            timers: Timers::new(&config),
            config,
            phase: Phase::Banner,
            session_id: None,
            strict_kex: false,
            channels: ChannelTable::new(),
            inbound_global: InboundGlobalRequests::default(),
            outbound_global: OutboundGlobalRequests::default(),
            deferred_outbound: Vec::new(),
        }
    }

    /// Enforces §4.7's dispatch gating before a message is handed to its
    /// handler: ranges above what the current phase allows are a fatal
    /// protocol error.
    pub fn gate_inbound(&self, message_type: u8) -> Result<MessageRange> {
        let range = MessageRange::of(message_type);
        if !self.phase.newkeys_done() && message_type > 49 {
            return Err(Error::ProtocolError(format!(
                "message type {message_type} illegal before first NEWKEYS"
            )));
        }
        if !self.phase.auth_complete() && message_type > 79 {
            return Err(Error::ProtocolError(format!(
                "message type {message_type} illegal before auth completes"
            )));
        }
        if self.strict_kex
            && matches!(self.phase, Phase::Banner | Phase::KexInitSent | Phase::KexInProgress)
            && matches!(message_type, 2 | 3 | 4)
        {
            return Err(Error::ProtocolError(
                "IGNORE/UNIMPLEMENTED/DEBUG before first NEWKEYS violates strict-KEX".into(),
            ));
        }
        Ok(range)
    }

    /// Sets the session id exactly once, at the first completed KEX
    /// (§3 invariant). Later rekeys must not call this again.
    pub fn set_session_id_once(&mut self, session_id: Vec<u8>) -> Result<()> {
        if self.session_id.is_some() {
            return Err(Error::ProtocolError("session_id set more than once".into()));
        }
        self.session_id = Some(session_id);
        Ok(())
    }

    /// Whether an outbound non-KEX message must be deferred right now
    /// (§4.2).
    pub fn must_defer_outbound(&self, message_type: u8) -> bool {
        matches!(self.phase, Phase::KexInitSent | Phase::KexInProgress)
            && !matches!(MessageRange::of(message_type), MessageRange::Transport | MessageRange::KexEnvelope | MessageRange::KexSpecific)
    }

    pub fn defer(&mut self, payload: Vec<u8>) {
        self.deferred_outbound.push(payload);
    }

    /// Drains messages queued during a rekey, in original order, once
    /// `NEWKEYS` has been sent (§4.2, property 5).
    pub fn drain_deferred(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.deferred_outbound)
    }

    /// Cancellation on close (§5): every pending global request fails and
    /// every channel is synthetically closed; callers drop per-channel
    /// consumers themselves since this crate holds no I/O handles.
    pub fn begin_close(&mut self) {
        self.phase = Phase::Closing;
        self.outbound_global.fail_all();
    }

    /// §4.7 "Timers": whether `login_timeout` has elapsed with auth still
    /// incomplete. A caller polling this should treat `true` as fatal.
    pub fn login_timed_out(&self) -> bool {
        self.timers.login_timed_out(self.phase.auth_complete())
    }

    /// §4.2 step c: whether the negotiated compression algorithm should
    /// be active right now. `zlib@openssh.com`'s whole point is *delayed*
    /// activation, so it only turns on once auth has completed; plain
    /// `zlib` has no such rule and is active as soon as it's negotiated
    /// (i.e. once NEWKEYS has gone both ways). A caller driving a real
    /// `PacketWriter`/`PacketReader` should call this after every phase
    /// transition and after each rekey, and assign the result to that
    /// side's `compression_active`/`decompression_active` field.
    pub fn compression_should_be_active(&self, algorithm: &str) -> bool {
        match algorithm {
            "none" => false,
            "zlib@openssh.com" => self.phase.auth_complete(),
            _ => self.phase.newkeys_done(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        Connection::new(ConnectionConfig::default())
    }

    #[test]
    fn rejects_auth_message_before_newkeys() {
        let c = conn();
        assert!(c.gate_inbound(50).is_err());
    }

    #[test]
    fn allows_transport_message_before_newkeys() {
        let c = conn();
        assert!(c.gate_inbound(1).is_ok());
    }

    #[test]
    fn rejects_channel_message_before_auth_complete() {
        let mut c = conn();
        c.phase = Phase::AuthInProgress;
        assert!(c.gate_inbound(90).is_err());
    }

    #[test]
    fn allows_channel_message_once_open() {
        let mut c = conn();
        c.phase = Phase::Open;
        assert!(c.gate_inbound(90).is_ok());
    }

    #[test]
    fn session_id_settable_once() {
        let mut c = conn();
        c.set_session_id_once(vec![1, 2, 3]).unwrap();
        assert!(c.set_session_id_once(vec![4]).is_err());
    }

    #[test]
    fn strict_kex_rejects_ignore_before_newkeys() {
        let mut c = conn();
        c.strict_kex = true;
        assert!(c.gate_inbound(2).is_err());
    }

    #[test]
    fn defers_non_kex_messages_during_rekey() {
        let mut c = conn();
        c.phase = Phase::KexInProgress;
        assert!(c.must_defer_outbound(94)); // CHANNEL_DATA
        assert!(!c.must_defer_outbound(20)); // KEXINIT itself
    }

    #[test]
    fn rekey_triggers_on_byte_threshold() {
        let mut c = conn();
        c.config.rekey_bytes = 100;
        c.rekey = RekeyPolicy::new(&c.config);
        assert!(!c.rekey.should_rekey());
        c.rekey.note_sent(150);
        assert!(c.rekey.should_rekey());
    }

    #[test]
    fn login_timeout_only_fires_before_auth_completes() {
        let mut config = ConnectionConfig::default();
        config.login_timeout = Some(Duration::from_secs(0));
        let mut c = Connection::new(config);
        assert!(c.login_timed_out());
        c.phase = Phase::Open;
        assert!(!c.login_timed_out());
    }

    #[test]
    fn zlib_openssh_activates_only_after_auth_complete() {
        let mut c = conn();
        c.phase = Phase::AuthInProgress;
        assert!(!c.compression_should_be_active("zlib@openssh.com"));
        c.phase = Phase::Open;
        assert!(c.compression_should_be_active("zlib@openssh.com"));
    }

    #[test]
    fn plain_zlib_activates_as_soon_as_negotiated() {
        let mut c = conn();
        c.phase = Phase::KexInProgress;
        assert!(!c.compression_should_be_active("zlib"));
        c.phase = Phase::AuthPending;
        assert!(c.compression_should_be_active("zlib"));
    }

    #[test]
    fn none_is_never_active() {
        let mut c = conn();
        c.phase = Phase::Open;
        assert!(!c.compression_should_be_active("none"));
    }

    #[test]
    fn keepalive_disabled_by_default() {
        let c = conn();
        assert!(!c.timers.keepalive_due());
    }

    #[test]
    fn keepalive_misses_accumulate_to_fatal() {
        let mut config = ConnectionConfig::default();
        config.keepalive_count_max = 2;
        let mut timers = Timers::new(&config);
        assert!(!timers.note_keepalive_miss());
        assert!(timers.note_keepalive_miss());
        timers.note_keepalive_reply();
        assert!(!timers.note_keepalive_miss());
    }
}
