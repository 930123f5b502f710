//! SFTP v3-v6 wire format (C8, §4.8): the packet codec, attribute
//! encoding, and the small value types (`SftpName`, `SftpLimits`) that
//! ride inside it.
//!
//! This crate has no notion of a connection, a handle table, or a
//! filesystem; it only turns bytes into typed messages and back. The
//! client and server engines that give those messages meaning live in
//! the `sftp` crate.

pub mod attrs;
pub mod limits;
pub mod name;
pub mod packet;
pub mod status;

pub use attrs::{FileType, SftpAttrs, Timestamp};
pub use limits::SftpLimits;
pub use name::SftpName;
pub use packet::{MessageType, SftpMessage};
pub use status::StatusCode;

pub const MIN_VERSION: u32 = 3;
pub const MAX_VERSION: u32 = 6;
