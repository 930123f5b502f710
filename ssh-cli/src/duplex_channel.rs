//! A length-prefixed `SftpSink`/`SftpSource` adapter over any
//! `AsyncRead`/`AsyncWrite` half. The SFTP engines treat a channel as
//! already-framed whole packets (see `sftp::channel`'s doc comment); this
//! is the concrete adapter that owns the `uint32 length` framing for a
//! byte stream, the same split of responsibility `ssh_transport`'s
//! `PacketWriter`/`PacketReader` apply one layer down for the SSH
//! connection itself.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

use sftp::channel::{SftpSink, SftpSource};

pub struct FramedSink<W> {
    writer: Mutex<W>,
}

impl<W> FramedSink<W> {
    pub fn new(writer: W) -> Self {
        FramedSink { writer: Mutex::new(writer) }
    }
}

#[async_trait]
impl<W: tokio::io::AsyncWrite + Unpin + Send> SftpSink for FramedSink<W> {
    async fn send(&self, payload: Vec<u8>) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_u32(payload.len() as u32).await?;
        writer.write_all(&payload).await?;
        writer.flush().await
    }
}

pub struct FramedSource<R> {
    reader: R,
}

impl<R> FramedSource<R> {
    pub fn new(reader: R) -> Self {
        FramedSource { reader }
    }
}

#[async_trait]
impl<R: tokio::io::AsyncRead + Unpin + Send> SftpSource for FramedSource<R> {
    async fn recv(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let len = match self.reader.read_u32().await {
            Ok(len) => len,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut buf = vec![0u8; len as usize];
        self.reader.read_exact(&mut buf).await?;
        Ok(Some(buf))
    }
}
