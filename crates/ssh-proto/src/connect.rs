//! Connection-protocol messages: global requests and channel multiplexing
//! (RFC 4254 §4-7).

use binrw::binrw;

use crate::arch::{Bool, Bytes, Rest, Utf8};

/// `SSH_MSG_GLOBAL_REQUEST`.
#[binrw]
#[brw(big, magic = 80u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalRequest {
    pub request_name: Utf8,
    pub want_reply: Bool,
    pub request_data: Rest,
}

/// `SSH_MSG_REQUEST_SUCCESS`. The response payload is request-name
/// specific (e.g. the bound port for `tcpip-forward`); left as [`Rest`].
#[binrw]
#[brw(big, magic = 81u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSuccess {
    pub response_data: Rest,
}

/// `SSH_MSG_REQUEST_FAILURE`.
#[binrw]
#[brw(big, magic = 82u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFailure;

/// `SSH_MSG_CHANNEL_OPEN`. `channel_type` selects which
/// [`OpenChannelData`]-shaped tail follows; the core's channel-adaptor
/// registry decides how to parse `type_specific_data`.
#[binrw]
#[brw(big, magic = 90u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpen {
    pub channel_type: Utf8,
    pub sender_channel: u32,
    pub initial_window_size: u32,
    pub maximum_packet_size: u32,
    pub type_specific_data: Rest,
}

/// `SSH_MSG_CHANNEL_OPEN_CONFIRMATION`.
#[binrw]
#[brw(big, magic = 91u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpenConfirmation {
    pub recipient_channel: u32,
    pub sender_channel: u32,
    pub initial_window_size: u32,
    pub maximum_packet_size: u32,
    pub type_specific_data: Rest,
}

/// `SSH_MSG_CHANNEL_OPEN_FAILURE`.
#[binrw]
#[brw(big, magic = 92u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpenFailure {
    pub recipient_channel: u32,
    pub reason_code: ChannelOpenFailureReason,
    pub description: Utf8,
    pub language_tag: Utf8,
}

#[binrw]
#[brw(big, repr(u32))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOpenFailureReason {
    AdministrativelyProhibited = 1,
    ConnectFailed = 2,
    UnknownChannelType = 3,
    ResourceShortage = 4,
}

/// `SSH_MSG_CHANNEL_WINDOW_ADJUST`.
#[binrw]
#[brw(big, magic = 93u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelWindowAdjust {
    pub recipient_channel: u32,
    pub bytes_to_add: u32,
}

/// `SSH_MSG_CHANNEL_DATA`.
#[binrw]
#[brw(big, magic = 94u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelData {
    pub recipient_channel: u32,
    pub data: Bytes,
}

/// `SSH_MSG_CHANNEL_EXTENDED_DATA`. `data_type_code` 1 (`SSH_EXTENDED_DATA_STDERR`)
/// is the only value RFC 4254 defines.
#[binrw]
#[brw(big, magic = 95u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelExtendedData {
    pub recipient_channel: u32,
    pub data_type_code: u32,
    pub data: Bytes,
}

/// `SSH_MSG_CHANNEL_EOF`.
#[binrw]
#[brw(big, magic = 96u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEof {
    pub recipient_channel: u32,
}

/// `SSH_MSG_CHANNEL_CLOSE`.
#[binrw]
#[brw(big, magic = 97u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClose {
    pub recipient_channel: u32,
}

/// `SSH_MSG_CHANNEL_REQUEST`.
#[binrw]
#[brw(big, magic = 98u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    pub recipient_channel: u32,
    pub request_type: Utf8,
    pub want_reply: Bool,
    pub type_specific_data: Rest,
}

/// `SSH_MSG_CHANNEL_SUCCESS`.
#[binrw]
#[brw(big, magic = 99u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSuccess {
    pub recipient_channel: u32,
}

/// `SSH_MSG_CHANNEL_FAILURE`.
#[binrw]
#[brw(big, magic = 100u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFailure {
    pub recipient_channel: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::{BinRead, BinWrite};
    use std::io::Cursor;

    #[test]
    fn channel_open_roundtrip() {
        let msg = ChannelOpen {
            channel_type: "session".into(),
            sender_channel: 0,
            initial_window_size: 2 * 1024 * 1024,
            maximum_packet_size: 32768,
            type_specific_data: Rest(Vec::new()),
        };
        let mut buf = Cursor::new(Vec::new());
        msg.write(&mut buf).unwrap();
        buf.set_position(0);
        assert_eq!(ChannelOpen::read(&mut buf).unwrap(), msg);
    }

    #[test]
    fn channel_data_roundtrip() {
        let msg = ChannelData {
            recipient_channel: 7,
            data: Bytes(b"hello".to_vec()),
        };
        let mut buf = Cursor::new(Vec::new());
        msg.write(&mut buf).unwrap();
        buf.set_position(0);
        assert_eq!(ChannelData::read(&mut buf).unwrap(), msg);
    }
}
