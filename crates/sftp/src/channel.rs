//! The boundary between this crate and whatever carries SFTP packets
//! (an SSH `session` channel's `CHANNEL_DATA`, a unit-test `tokio::io::duplex`,
//! a loopback pipe for local-to-local `copy-data`).
//!
//! Implementors are responsible for the `uint32 length` framing around
//! each encoded message (§4.8): `send`/`recv` here operate on whole,
//! already-length-delimited SFTP packets, mirroring how `ssh_transport`'s
//! `PacketWriter`/`PacketReader` own framing for the SSH layer one level
//! down. Keeping that boundary here, rather than re-deriving it in every
//! engine method, is what lets the client/server engines stay agnostic
//! to whether they're riding a live channel or a test double.

use async_trait::async_trait;

#[async_trait]
pub trait SftpSink: Send + Sync {
    async fn send(&self, payload: Vec<u8>) -> std::io::Result<()>;
}

#[async_trait]
pub trait SftpSource: Send {
    /// `Ok(None)` signals a clean EOF (peer closed the channel).
    async fn recv(&mut self) -> std::io::Result<Option<Vec<u8>>>;
}
