//! Transport-layer messages, RFC 4253 §11-12 plus the EXT_INFO extension
//! (RFC 8308) and KEXINIT negotiation envelope (RFC 4253 §7.1).

use binrw::binrw;

use crate::arch::{Bool, Bytes, NameList, Utf8};

/// `SSH_MSG_DISCONNECT`.
#[binrw]
#[brw(big, magic = 1u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason_code: DisconnectReason,
    pub description: Utf8,
    pub language_tag: Utf8,
}

/// RFC 4253 §11.1. Codes in the private-use range (0xFE000000-0xFFFFFFFF)
/// and any value this list doesn't name round-trip through [`Self::Other`].
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    #[brw(magic = 1u32)]
    HostNotAllowedToConnect,
    #[brw(magic = 2u32)]
    ProtocolError,
    #[brw(magic = 3u32)]
    KeyExchangeFailed,
    #[brw(magic = 4u32)]
    Reserved,
    #[brw(magic = 5u32)]
    MacError,
    #[brw(magic = 6u32)]
    CompressionError,
    #[brw(magic = 7u32)]
    ServiceNotAvailable,
    #[brw(magic = 8u32)]
    ProtocolVersionNotSupported,
    #[brw(magic = 9u32)]
    HostKeyNotVerifiable,
    #[brw(magic = 10u32)]
    ConnectionLost,
    #[brw(magic = 11u32)]
    ByApplication,
    #[brw(magic = 12u32)]
    TooManyConnections,
    #[brw(magic = 13u32)]
    AuthCancelledByUser,
    #[brw(magic = 14u32)]
    NoMoreAuthMethodsAvailable,
    #[brw(magic = 15u32)]
    IllegalUserName,
    Other(u32),
}

/// `SSH_MSG_IGNORE`.
#[binrw]
#[brw(big, magic = 2u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ignore {
    pub data: Bytes,
}

/// `SSH_MSG_UNIMPLEMENTED`.
#[binrw]
#[brw(big, magic = 3u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unimplemented {
    pub sequence_number: u32,
}

/// `SSH_MSG_DEBUG`.
#[binrw]
#[brw(big, magic = 4u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debug {
    pub always_display: Bool,
    pub message: Utf8,
    pub language_tag: Utf8,
}

/// `SSH_MSG_SERVICE_REQUEST`.
#[binrw]
#[brw(big, magic = 5u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    pub service_name: Utf8,
}

/// `SSH_MSG_SERVICE_ACCEPT`.
#[binrw]
#[brw(big, magic = 6u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccept {
    pub service_name: Utf8,
}

/// `SSH_MSG_EXT_INFO` (RFC 8308 §2.3). Sent at most once per direction,
/// immediately after the sender's first `NEWKEYS`.
#[binrw]
#[brw(big, magic = 7u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtInfo {
    #[bw(calc = extensions.len() as u32)]
    num_extensions: u32,
    #[br(count = num_extensions)]
    pub extensions: Vec<Extension>,
}

#[binrw]
#[brw(big)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub name: Utf8,
    pub value: Bytes,
}

/// `SSH_MSG_KEXINIT` (RFC 4253 §7.1). `kex_algorithms` carries the
/// `ext-info-*`/`kex-strict-*-v00@openssh.com` pseudo-algorithms inline,
/// same as the name list advertised on the wire.
#[binrw]
#[brw(big, magic = 20u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexInit {
    pub cookie: [u8; 16],
    pub kex_algorithms: NameList,
    pub server_host_key_algorithms: NameList,
    pub encryption_algorithms_client_to_server: NameList,
    pub encryption_algorithms_server_to_client: NameList,
    pub mac_algorithms_client_to_server: NameList,
    pub mac_algorithms_server_to_client: NameList,
    pub compression_algorithms_client_to_server: NameList,
    pub compression_algorithms_server_to_client: NameList,
    pub languages_client_to_server: NameList,
    pub languages_server_to_client: NameList,
    pub first_kex_packet_follows: Bool,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
}

/// `SSH_MSG_NEWKEYS`.
#[binrw]
#[brw(big, magic = 21u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewKeys;

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::{BinRead, BinWrite};
    use std::io::Cursor;

    #[test]
    fn disconnect_roundtrip() {
        let msg = Disconnect {
            reason_code: DisconnectReason::ByApplication,
            description: "bye".into(),
            language_tag: "".into(),
        };
        let mut buf = Cursor::new(Vec::new());
        msg.write(&mut buf).unwrap();
        buf.set_position(0);
        let back = Disconnect::read(&mut buf).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn disconnect_reason_unknown_code_roundtrips() {
        let reason = DisconnectReason::Other(0xFE000001);
        let mut buf = Cursor::new(Vec::new());
        reason.write(&mut buf).unwrap();
        buf.set_position(0);
        assert_eq!(DisconnectReason::read(&mut buf).unwrap(), reason);
    }

    #[test]
    fn kexinit_roundtrip() {
        let msg = KexInit {
            cookie: [7u8; 16],
            kex_algorithms: NameList(vec!["curve25519-sha256".into()]),
            server_host_key_algorithms: NameList(vec!["ssh-ed25519".into()]),
            encryption_algorithms_client_to_server: NameList(vec!["aes128-ctr".into()]),
            encryption_algorithms_server_to_client: NameList(vec!["aes128-ctr".into()]),
            mac_algorithms_client_to_server: NameList(vec!["hmac-sha2-256".into()]),
            mac_algorithms_server_to_client: NameList(vec!["hmac-sha2-256".into()]),
            compression_algorithms_client_to_server: NameList(vec!["none".into()]),
            compression_algorithms_server_to_client: NameList(vec!["none".into()]),
            languages_client_to_server: NameList(vec![]),
            languages_server_to_client: NameList(vec![]),
            first_kex_packet_follows: false.into(),
        };
        let mut buf = Cursor::new(Vec::new());
        msg.write(&mut buf).unwrap();
        buf.set_position(0);
        assert_eq!(KexInit::read(&mut buf).unwrap(), msg);
    }
}
