//! C5: channel multiplexing (§4.5). Owns window/flow-control accounting
//! and local-id allocation; the byte payloads themselves are handed off
//! to per-type adaptors (session, direct-tcpip, ...) the connection
//! controller looks up by `channel_type`.

use std::collections::HashMap;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

/// §9 compat quirk: Dropbear under-reports the usable channel packet
/// size by one byte once compression is active. Callers building a
/// [`Channel`] from a peer's `CHANNEL_OPEN_CONFIRMATION` should run the
/// negotiated `max_pkt` through this before calling [`Channel::new`].
pub fn adjust_remote_max_packet(negotiated: u32, config: &ConnectionConfig, compression_active: bool) -> u32 {
    if compression_active && config.is_dropbear_peer() {
        negotiated.saturating_sub(1)
    } else {
        negotiated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Session,
    DirectTcpip,
    ForwardedTcpip,
    DirectStreamlocal,
    ForwardedStreamlocal,
    X11,
    AuthAgent,
    Tun,
}

impl ChannelType {
    pub fn wire_name(self) -> &'static str {
        match self {
            ChannelType::Session => "session",
            ChannelType::DirectTcpip => "direct-tcpip",
            ChannelType::ForwardedTcpip => "forwarded-tcpip",
            ChannelType::DirectStreamlocal => "direct-streamlocal@openssh.com",
            ChannelType::ForwardedStreamlocal => "forwarded-streamlocal@openssh.com",
            ChannelType::X11 => "x11",
            ChannelType::AuthAgent => "auth-agent@openssh.com",
            ChannelType::Tun => "tun@openssh.com",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<ChannelType> {
        Some(match name {
            "session" => ChannelType::Session,
            "direct-tcpip" => ChannelType::DirectTcpip,
            "forwarded-tcpip" => ChannelType::ForwardedTcpip,
            "direct-streamlocal@openssh.com" => ChannelType::DirectStreamlocal,
            "forwarded-streamlocal@openssh.com" => ChannelType::ForwardedStreamlocal,
            "x11" => ChannelType::X11,
            "auth-agent@openssh.com" => ChannelType::AuthAgent,
            "tun@openssh.com" => ChannelType::Tun,
            _ => return None,
        })
    }
}

/// One multiplexed duplex stream (§3 "Channel").
pub struct Channel {
    pub local_id: u32,
    pub remote_id: u32,
    pub channel_type: ChannelType,
    pub recv_window: u32,
    pub send_window: u32,
    pub max_packet: u32,
    pub remote_max_packet: u32,
    initial_recv_window: u32,
    pub recv_eof: bool,
    pub sent_eof: bool,
    pub sent_close: bool,
    pub recv_close: bool,
}

impl Channel {
    pub fn new(
        local_id: u32,
        remote_id: u32,
        channel_type: ChannelType,
        initial_recv_window: u32,
        max_packet: u32,
        send_window: u32,
        remote_max_packet: u32,
    ) -> Self {
        Channel {
            local_id,
            remote_id,
            channel_type,
            recv_window: initial_recv_window,
            send_window,
            max_packet,
            remote_max_packet,
            initial_recv_window,
            recv_eof: false,
            sent_eof: false,
            sent_close: false,
            recv_close: false,
        }
    }

    /// Accounts for an outbound `CHANNEL_DATA`/`CHANNEL_EXTENDED_DATA`
    /// payload, splitting it into fragments no larger than the peer's
    /// advertised `max_pkt` and each of which fits in `send_window`
    /// (property 13).
    pub fn split_for_send<'a>(&mut self, data: &'a [u8]) -> Result<Vec<&'a [u8]>> {
        if data.len() as u64 > self.send_window as u64 {
            return Err(Error::ProtocolError("channel send window exceeded".into()));
        }
        let chunk = self.remote_max_packet.max(1) as usize;
        let mut out = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let take = rest.len().min(chunk);
            let (head, tail) = rest.split_at(take);
            out.push(head);
            rest = tail;
        }
        self.send_window -= data.len() as u32;
        Ok(out)
    }

    /// Records inbound data consuming `len` bytes of `recv_window` and
    /// reports whether a `WINDOW_ADJUST` should now be sent (§4.5:
    /// replenish once credit drops below half of the initial window).
    pub fn consume_recv_window(&mut self, len: u32) -> Result<Option<u32>> {
        if len > self.recv_window {
            return Err(Error::ProtocolError("peer exceeded channel recv window".into()));
        }
        self.recv_window -= len;
        if self.recv_window < self.initial_recv_window / 2 {
            let adjust = self.initial_recv_window - self.recv_window;
            self.recv_window = self.initial_recv_window;
            Ok(Some(adjust))
        } else {
            Ok(None)
        }
    }

    pub fn on_window_adjust(&mut self, bytes_to_add: u32) {
        self.send_window = self.send_window.saturating_add(bytes_to_add);
    }

    /// True once both sides have exchanged `CHANNEL_CLOSE` (§4.5); the
    /// owning table frees `local_id` at this point.
    pub fn fully_closed(&self) -> bool {
        self.sent_close && self.recv_close
    }
}

/// Owns every channel for one connection and the monotonic local-id
/// counter (§9 "cyclic references": the connection owns channels by id;
/// channels never hold a strong reference back).
#[derive(Default)]
pub struct ChannelTable {
    channels: HashMap<u32, Channel>,
    next_id: u32,
}

impl ChannelTable {
    pub fn new() -> Self {
        ChannelTable::default()
    }

    pub fn allocate_id(&mut self) -> u32 {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if !self.channels.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn insert(&mut self, channel: Channel) {
        self.channels.insert(channel.local_id, channel);
    }

    pub fn get(&self, local_id: u32) -> Option<&Channel> {
        self.channels.get(&local_id)
    }

    pub fn get_mut(&mut self, local_id: u32) -> Option<&mut Channel> {
        self.channels.get_mut(&local_id)
    }

    /// Frees `local_id` (property 12) once both sides have closed it.
    pub fn remove_if_closed(&mut self, local_id: u32) -> bool {
        if self.channels.get(&local_id).is_some_and(Channel::fully_closed) {
            self.channels.remove(&local_id);
            true
        } else {
            false
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &u32> {
        self.channels.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chan() -> Channel {
        Channel::new(0, 7, ChannelType::Session, 1024, 256, 1024, 256)
    }

    #[test]
    fn send_window_never_negative() {
        let mut c = chan();
        assert!(c.split_for_send(&vec![0u8; 2000]).is_err());
    }

    #[test]
    fn split_respects_remote_max_packet() {
        let mut c = chan();
        let data = vec![1u8; 600];
        let parts = c.split_for_send(&data).unwrap();
        assert!(parts.iter().all(|p| p.len() <= 256));
        assert_eq!(c.send_window, 1024 - 600);
    }

    #[test]
    fn recv_window_replenishes_past_half() {
        let mut c = chan();
        let adjust = c.consume_recv_window(600).unwrap();
        assert_eq!(adjust, Some(600));
        assert_eq!(c.recv_window, 1024);
    }

    #[test]
    fn dropbear_max_packet_adjusted_only_with_compression() {
        let mut config = ConnectionConfig::default();
        config.peer_version_string = Some("SSH-2.0-dropbear_2022.83".into());
        assert_eq!(adjust_remote_max_packet(256, &config, true), 255);
        assert_eq!(adjust_remote_max_packet(256, &config, false), 256);
    }

    #[test]
    fn non_dropbear_peer_max_packet_unchanged() {
        let config = ConnectionConfig::default();
        assert_eq!(adjust_remote_max_packet(256, &config, true), 256);
    }

    #[test]
    fn id_freed_after_mutual_close() {
        let mut table = ChannelTable::new();
        let id = table.allocate_id();
        table.insert(Channel::new(id, 1, ChannelType::Session, 1024, 256, 1024, 256));
        assert!(!table.remove_if_closed(id));
        {
            let c = table.get_mut(id).unwrap();
            c.sent_close = true;
            c.recv_close = true;
        }
        assert!(table.remove_if_closed(id));
        assert!(table.get(id).is_none());
    }
}
