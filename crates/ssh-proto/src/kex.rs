//! KEX-method-specific messages (RFC 4253 §8, RFC 5656 §4). Message
//! numbers 30-49 are reused by every KEX method; which struct a given
//! connection expects depends entirely on the negotiated `kex_algorithms`
//! entry, so the active [`ssh_core::kex::KexMethod`](../../ssh-core/src/kex.rs)
//! is responsible for choosing which of these to parse.

use binrw::binrw;

use crate::arch::{Bytes, MpInt};

/// `SSH_MSG_KEXDH_INIT` / the client half of finite-field Diffie-Hellman.
#[binrw]
#[brw(big, magic = 30u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexDhInit {
    pub e: MpInt,
}

/// `SSH_MSG_KEXDH_REPLY`.
#[binrw]
#[brw(big, magic = 31u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexDhReply {
    pub host_key: Bytes,
    pub f: MpInt,
    pub signature: Bytes,
}

/// `SSH_MSG_KEX_ECDH_INIT` (RFC 5656 §4), reused by curve25519/curve448
/// (RFC 8731) with `q_c`/`q_s` holding the raw Montgomery-form public key
/// instead of an mpint-encoded EC point.
#[binrw]
#[brw(big, magic = 30u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexEcdhInit {
    pub q_c: Bytes,
}

/// `SSH_MSG_KEX_ECDH_REPLY`.
#[binrw]
#[brw(big, magic = 31u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexEcdhReply {
    pub host_key: Bytes,
    pub q_s: Bytes,
    pub signature: Bytes,
}
