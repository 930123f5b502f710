//! Primitive wire types shared by every SSH message (RFC 4251 §5).
//!
//! SSH packets are always big-endian, unlike most of this codebase's
//! teacher lineage. Each primitive here implements [`binrw::BinRead`] /
//! [`binrw::BinWrite`] directly so message structs can just `#[derive(BinRead, BinWrite)]`
//! and list fields in wire order.

use std::io::{Read, Seek, Write};

use binrw::{BinRead, BinWrite, Endian};

/// `boolean` (RFC 4251 §5): one byte, any non-zero value is `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bool(pub bool);

impl BinRead for Bool {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let raw = u8::read_options(reader, endian, ())?;
        Ok(Bool(raw != 0))
    }
}

impl BinWrite for Bool {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        (self.0 as u8).write_options(writer, endian, ())
    }
}

impl From<bool> for Bool {
    fn from(value: bool) -> Self {
        Bool(value)
    }
}

impl From<Bool> for bool {
    fn from(value: Bool) -> Self {
        value.0
    }
}

/// `string` (RFC 4251 §5): uint32 length followed by that many arbitrary
/// bytes. Used both for binary blobs (host key, signature payloads) and,
/// via [`Utf8`]/[`Ascii`], for text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bytes(pub Vec<u8>);

impl BinRead for Bytes {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let len = u32::read_options(reader, endian, ())? as usize;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).map_err(|e| binrw::Error::Io(e))?;
        Ok(Bytes(buf))
    }
}

impl BinWrite for Bytes {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        (self.0.len() as u32).write_options(writer, endian, ())?;
        writer.write_all(&self.0).map_err(|e| binrw::Error::Io(e))
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(value: Vec<u8>) -> Self {
        Bytes(value)
    }
}

impl From<&[u8]> for Bytes {
    fn from(value: &[u8]) -> Self {
        Bytes(value.to_vec())
    }
}

impl std::ops::Deref for Bytes {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// `string` interpreted as UTF-8 text (RFC 4251 §5). Invalid UTF-8 is a
/// [`ProtoError::MalformedPacket`](crate::ProtoError::MalformedPacket).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Utf8(pub String);

impl BinRead for Utf8 {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let raw = Bytes::read_options(reader, endian, args)?;
        let s = String::from_utf8(raw.0).map_err(|e| binrw::Error::Custom {
            pos: 0,
            err: Box::new(e),
        })?;
        Ok(Utf8(s))
    }
}

impl BinWrite for Utf8 {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        Bytes(self.0.as_bytes().to_vec()).write_options(writer, endian, args)
    }
}

impl From<&str> for Utf8 {
    fn from(value: &str) -> Self {
        Utf8(value.to_owned())
    }
}

impl From<String> for Utf8 {
    fn from(value: String) -> Self {
        Utf8(value)
    }
}

/// `name-list` (RFC 4251 §5): a `string` whose payload is a comma-separated
/// list of ASCII algorithm/extension names, each non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameList(pub Vec<String>);

impl BinRead for NameList {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let raw = Utf8::read_options(reader, endian, args)?;
        if raw.0.is_empty() {
            return Ok(NameList(Vec::new()));
        }
        Ok(NameList(raw.0.split(',').map(str::to_owned).collect()))
    }
}

impl BinWrite for NameList {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        Utf8(self.0.join(",")).write_options(writer, endian, args)
    }
}

impl NameList {
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    /// The first entry of `self` that also appears in `other` — the
    /// client-preference-wins negotiation rule used throughout KEX (RFC
    /// 4253 §7.1).
    pub fn first_match(&self, other: &NameList) -> Option<&str> {
        self.0.iter().find(|n| other.contains(n)).map(String::as_str)
    }
}

impl<T: Into<String>> FromIterator<T> for NameList {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        NameList(iter.into_iter().map(Into::into).collect())
    }
}

/// `mpint` (RFC 4251 §5): a `string` holding a two's-complement big-endian
/// integer, with the minimal number of bytes (a leading `0x00` is inserted
/// only when the high bit of the first byte would otherwise flip the sign
/// of a non-negative value).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MpInt(pub Vec<u8>);

impl MpInt {
    /// Builds an `MpInt` from an unsigned big-endian magnitude, trimming
    /// leading zero bytes and re-adding the sign-guard byte as needed.
    pub fn from_unsigned_be(mut magnitude: Vec<u8>) -> Self {
        while magnitude.first() == Some(&0) && magnitude.len() > 1 {
            magnitude.remove(0);
        }
        if magnitude.is_empty() {
            return MpInt(Vec::new());
        }
        if magnitude[0] & 0x80 != 0 {
            let mut padded = Vec::with_capacity(magnitude.len() + 1);
            padded.push(0);
            padded.extend_from_slice(&magnitude);
            MpInt(padded)
        } else {
            MpInt(magnitude)
        }
    }

    pub fn as_unsigned_be(&self) -> &[u8] {
        if self.0.first() == Some(&0) {
            &self.0[1..]
        } else {
            &self.0
        }
    }
}

impl BinRead for MpInt {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let raw = Bytes::read_options(reader, endian, args)?;
        Ok(MpInt(raw.0))
    }
}

impl BinWrite for MpInt {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        Bytes(self.0.clone()).write_options(writer, endian, args)
    }
}

/// The remaining bytes of a packet with no length prefix of its own —
/// used for method/request-specific tails (`USERAUTH_REQUEST` method data,
/// `GLOBAL_REQUEST`/`CHANNEL_REQUEST` payloads) whose shape depends on a
/// preceding name field the generic message type can't see.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rest(pub Vec<u8>);

impl BinRead for Rest {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map_err(|e| binrw::Error::Io(e))?;
        Ok(Rest(buf))
    }
}

impl BinWrite for Rest {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        writer.write_all(&self.0).map_err(|e| binrw::Error::Io(e))
    }
}

impl From<Vec<u8>> for Rest {
    fn from(value: Vec<u8>) -> Self {
        Rest(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn namelist_roundtrip() {
        let list = NameList(vec!["curve25519-sha256".into(), "diffie-hellman-group14-sha1".into()]);
        let mut buf = Cursor::new(Vec::new());
        list.write_options(&mut buf, Endian::Big, ()).unwrap();
        buf.set_position(0);
        let back = NameList::read_options(&mut buf, Endian::Big, ()).unwrap();
        assert_eq!(list, back);
    }

    #[test]
    fn mpint_sign_guard() {
        // 0x80 alone would look negative; RFC 4251 example expects 00 80.
        let v = MpInt::from_unsigned_be(vec![0x80]);
        assert_eq!(v.0, vec![0x00, 0x80]);
    }

    #[test]
    fn mpint_no_guard_needed() {
        let v = MpInt::from_unsigned_be(vec![0x7f]);
        assert_eq!(v.0, vec![0x7f]);
    }

    #[test]
    fn first_match_prefers_client_order() {
        let client = NameList(vec!["a".into(), "b".into(), "c".into()]);
        let server = NameList(vec!["c".into(), "b".into()]);
        assert_eq!(client.first_match(&server), Some("b"));
    }
}
