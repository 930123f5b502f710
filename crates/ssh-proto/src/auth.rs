//! User authentication messages, RFC 4252 §5-8.
//!
//! `USERAUTH_REQUEST`'s shape after `method_name` depends on the method,
//! and three message numbers (60/61) are reused with different meaning by
//! different methods (`publickey` PK_OK vs `password` PASSWD_CHANGEREQ vs
//! `keyboard-interactive` INFO_REQUEST/RESPONSE). Rather than fork the
//! message type on a value the generic frame can't see, the method-specific
//! tail is kept as [`Rest`] here and interpreted by the active auth method
//! in `ssh-core`, the same way [`crate::kex`] leaves interpretation of
//! 30-49 to the active KEX method.

use binrw::binrw;

use crate::arch::{Bool, Rest, Utf8};

/// `SSH_MSG_USERAUTH_REQUEST`.
#[binrw]
#[brw(big, magic = 50u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthRequest {
    pub user_name: Utf8,
    pub service_name: Utf8,
    pub method_name: Utf8,
    pub method_data: Rest,
}

/// `SSH_MSG_USERAUTH_FAILURE`.
#[binrw]
#[brw(big, magic = 51u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthFailure {
    pub continue_with: crate::arch::NameList,
    pub partial_success: Bool,
}

/// `SSH_MSG_USERAUTH_SUCCESS`.
#[binrw]
#[brw(big, magic = 52u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserAuthSuccess;

/// `SSH_MSG_USERAUTH_BANNER`.
#[binrw]
#[brw(big, magic = 53u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthBanner {
    pub message: Utf8,
    pub language_tag: Utf8,
}

/// `SSH_MSG_USERAUTH_PK_OK` (type 60, `publickey` probe accepted).
#[binrw]
#[brw(big, magic = 60u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthPkOk {
    pub algorithm_name: Utf8,
    pub blob: crate::arch::Bytes,
}

/// `SSH_MSG_USERAUTH_PASSWD_CHANGEREQ` (also type 60, `password` method).
#[binrw]
#[brw(big, magic = 60u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthPasswdChangeReq {
    pub prompt: Utf8,
    pub language_tag: Utf8,
}

/// `SSH_MSG_USERAUTH_INFO_REQUEST` (also type 60, `keyboard-interactive`).
#[binrw]
#[brw(big, magic = 60u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthInfoRequest {
    pub name: Utf8,
    pub instruction: Utf8,
    pub language_tag: Utf8,
    #[bw(calc = prompts.len() as u32)]
    num_prompts: u32,
    #[br(count = num_prompts)]
    pub prompts: Vec<Prompt>,
}

#[binrw]
#[brw(big)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: Utf8,
    pub echo: Bool,
}

/// `SSH_MSG_USERAUTH_INFO_RESPONSE` (type 61).
#[binrw]
#[brw(big, magic = 61u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthInfoResponse {
    #[bw(calc = responses.len() as u32)]
    num_responses: u32,
    #[br(count = num_responses)]
    pub responses: Vec<Utf8>,
}
