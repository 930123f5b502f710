//! C5: `CHANNEL_REQUEST` subrequest dispatch (§4.5 "Request/subrequest",
//! RFC 4254 §6). Parses the named subrequest shapes a session channel
//! exchanges and decides what reply is owed; actually sending the
//! resulting `CHANNEL_SUCCESS`/`CHANNEL_FAILURE` (or nothing, if
//! `want_reply` was false) is the caller's job, same split as
//! `global_request`'s inbound queue.

use std::io::Cursor;

use binrw::BinReaderExt;

use ssh_proto::arch::{Bool, Bytes, Utf8};

/// One parsed `CHANNEL_REQUEST` body (RFC 4254 §6.2-§6.10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRequestKind {
    PtyReq {
        term: String,
        width_chars: u32,
        height_chars: u32,
        width_px: u32,
        height_px: u32,
        modes: Vec<u8>,
    },
    Shell,
    Exec {
        command: String,
    },
    Subsystem {
        name: String,
    },
    Env {
        name: String,
        value: String,
    },
    WindowChange {
        width_chars: u32,
        height_chars: u32,
        width_px: u32,
        height_px: u32,
    },
    X11Req {
        single_connection: bool,
        auth_protocol: String,
        auth_cookie: String,
        screen_number: u32,
    },
    AuthAgentReq,
    ExitStatus {
        code: u32,
    },
    ExitSignal {
        signal_name: String,
        core_dumped: bool,
        error_message: String,
        language_tag: String,
    },
    Break {
        length_ms: u32,
    },
    Signal {
        signal_name: String,
    },
}

/// Parses `type_specific_data` for a recognized `request_type` name.
/// `None` for a request name this engine has no shape for, or for a
/// body that's truncated/malformed relative to that shape — both cases
/// the caller treats identically (§4.5: reply `CHANNEL_FAILURE`).
pub fn parse_channel_request(request_type: &str, data: &[u8]) -> Option<ChannelRequestKind> {
    let mut c = Cursor::new(data);
    let kind = match request_type {
        "pty-req" => ChannelRequestKind::PtyReq {
            term: c.read_be::<Utf8>().ok()?.0,
            width_chars: c.read_be().ok()?,
            height_chars: c.read_be().ok()?,
            width_px: c.read_be().ok()?,
            height_px: c.read_be().ok()?,
            modes: c.read_be::<Bytes>().ok()?.0,
        },
        "shell" => ChannelRequestKind::Shell,
        "exec" => ChannelRequestKind::Exec { command: c.read_be::<Utf8>().ok()?.0 },
        "subsystem" => ChannelRequestKind::Subsystem { name: c.read_be::<Utf8>().ok()?.0 },
        "env" => ChannelRequestKind::Env {
            name: c.read_be::<Utf8>().ok()?.0,
            value: c.read_be::<Utf8>().ok()?.0,
        },
        "window-change" => ChannelRequestKind::WindowChange {
            width_chars: c.read_be().ok()?,
            height_chars: c.read_be().ok()?,
            width_px: c.read_be().ok()?,
            height_px: c.read_be().ok()?,
        },
        "x11-req" => ChannelRequestKind::X11Req {
            single_connection: c.read_be::<Bool>().ok()?.0,
            auth_protocol: c.read_be::<Utf8>().ok()?.0,
            auth_cookie: c.read_be::<Utf8>().ok()?.0,
            screen_number: c.read_be().ok()?,
        },
        "auth-agent-req@openssh.com" => ChannelRequestKind::AuthAgentReq,
        "exit-status" => ChannelRequestKind::ExitStatus { code: c.read_be().ok()? },
        "exit-signal" => ChannelRequestKind::ExitSignal {
            signal_name: c.read_be::<Utf8>().ok()?.0,
            core_dumped: c.read_be::<Bool>().ok()?.0,
            error_message: c.read_be::<Utf8>().ok()?.0,
            language_tag: c.read_be::<Utf8>().ok()?.0,
        },
        "break" => ChannelRequestKind::Break { length_ms: c.read_be().ok()? },
        "signal" => ChannelRequestKind::Signal { signal_name: c.read_be::<Utf8>().ok()?.0 },
        _ => return None,
    };
    Some(kind)
}

/// What the connection controller should send back for one inbound
/// `CHANNEL_REQUEST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRequestReply {
    Success,
    Failure,
    NoReplyWanted,
}

/// §4.5: an unrecognized request type, or one the owning channel type
/// doesn't accept (e.g. `pty-req` on a `direct-tcpip` channel), gets
/// `CHANNEL_FAILURE` when `want_reply` is set; a recognized, accepted one
/// gets `CHANNEL_SUCCESS`; `want_reply = false` owes nothing either way.
/// `accepted` is the caller's own judgment of whether `kind` applies to
/// this channel — parsing success alone doesn't imply acceptance.
pub fn dispatch_reply(kind: Option<&ChannelRequestKind>, accepted: bool, want_reply: bool) -> ChannelRequestReply {
    if !want_reply {
        return ChannelRequestReply::NoReplyWanted;
    }
    if kind.is_some() && accepted {
        ChannelRequestReply::Success
    } else {
        ChannelRequestReply::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::BinWrite;
    use ssh_proto::arch::Utf8 as ArchUtf8;

    fn encode_string(s: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        ArchUtf8::from(s).write_be(&mut buf).unwrap();
        buf.into_inner()
    }

    #[test]
    fn exec_parses_command() {
        let data = encode_string("ls -la");
        let kind = parse_channel_request("exec", &data).unwrap();
        assert_eq!(kind, ChannelRequestKind::Exec { command: "ls -la".into() });
    }

    #[test]
    fn subsystem_parses_name() {
        let data = encode_string("sftp");
        let kind = parse_channel_request("subsystem", &data).unwrap();
        assert_eq!(kind, ChannelRequestKind::Subsystem { name: "sftp".into() });
    }

    #[test]
    fn unrecognized_request_name_is_none() {
        assert!(parse_channel_request("frobnicate", &[]).is_none());
    }

    #[test]
    fn truncated_body_is_none() {
        // "exec" needs a string; an empty body can't supply one.
        assert!(parse_channel_request("exec", &[]).is_none());
    }

    #[test]
    fn unrecognized_request_with_want_reply_fails() {
        assert_eq!(dispatch_reply(None, false, true), ChannelRequestReply::Failure);
    }

    #[test]
    fn unrecognized_request_without_want_reply_is_silent() {
        assert_eq!(dispatch_reply(None, false, false), ChannelRequestReply::NoReplyWanted);
    }

    #[test]
    fn accepted_request_succeeds() {
        let kind = ChannelRequestKind::Shell;
        assert_eq!(dispatch_reply(Some(&kind), true, true), ChannelRequestReply::Success);
    }

    #[test]
    fn recognized_but_rejected_request_fails() {
        // e.g. pty-req on a channel type that doesn't support one.
        let kind = ChannelRequestKind::Shell;
        assert_eq!(dispatch_reply(Some(&kind), false, true), ChannelRequestReply::Failure);
    }
}
