//! Version banner exchange (RFC 4253 §4.2).

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

const MAX_BANNER_LINE: usize = 8192;
const MAX_PREAMBLE_LINES: usize = 1024;
const MAX_IDENTIFICATION_LEN: usize = 255;

/// Sends this side's identification string. `software_version` is
/// appended to `"SSH-2.0-"`; the total line (including the trailing
/// `\r\n`) must not exceed 255 octets.
pub async fn send_banner<W: AsyncWrite + Unpin>(
    writer: &mut W,
    software_version: &str,
) -> Result<String, TransportError> {
    let line = format!("SSH-2.0-{software_version}");
    if line.len() + 2 > MAX_IDENTIFICATION_LEN {
        return Err(TransportError::BannerTooLong);
    }
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    Ok(line)
}

/// Reads the peer's identification line, tolerating any number of
/// preceding non-`"SSH-"` lines up to [`MAX_PREAMBLE_LINES`] (servers may
/// print a legal banner before the version line; RFC 4253 §4.2). Clients
/// also accept an `SSH-1.99-` line as equivalent to `SSH-2.0-`.
pub async fn read_banner<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, TransportError> {
    let mut preamble_lines = 0usize;
    loop {
        let line = read_line(reader).await?;
        if line.starts_with("SSH-") {
            if !(line.starts_with("SSH-2.0-") || line.starts_with("SSH-1.99-")) {
                return Err(TransportError::UnsupportedProtocolVersion(line));
            }
            return Ok(line);
        }
        preamble_lines += 1;
        if preamble_lines > MAX_PREAMBLE_LINES {
            return Err(TransportError::TooManyPreambleLines);
        }
    }
}

async fn read_line<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, TransportError> {
    let mut buf = Vec::new();
    loop {
        if buf.len() > MAX_BANNER_LINE {
            return Err(TransportError::BannerTooLong);
        }
        let byte = reader.read_u8().await?;
        if byte == b'\n' {
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            break;
        }
        buf.push(byte);
    }
    String::from_utf8(buf).map_err(|_| TransportError::UnsupportedProtocolVersion(String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn send_then_read_roundtrip() {
        let (mut a, mut b) = duplex(256);
        let sent = send_banner(&mut a, "ours_1.0").await.unwrap();
        let read = read_banner(&mut b).await.unwrap();
        assert_eq!(sent, read);
        assert_eq!(read, "SSH-2.0-ours_1.0");
    }

    #[tokio::test]
    async fn tolerates_preamble_lines() {
        let (mut a, mut b) = duplex(256);
        a.write_all(b"Welcome to our server\r\n").await.unwrap();
        a.write_all(b"SSH-2.0-theirs_2.0\r\n").await.unwrap();
        let read = read_banner(&mut b).await.unwrap();
        assert_eq!(read, "SSH-2.0-theirs_2.0");
    }

    #[tokio::test]
    async fn rejects_ssh1() {
        let (mut a, mut b) = duplex(256);
        a.write_all(b"SSH-1.5-oldserver\r\n").await.unwrap();
        let err = read_banner(&mut b).await.unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedProtocolVersion(_)));
    }
}
