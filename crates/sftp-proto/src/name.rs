//! `SFTPName` (§3, §4.8): one entry of a `NAME` response, returned by
//! `READDIR`/`REALPATH`/`READLINK`. `longname` is only meaningful on v3,
//! where the server must format an `ls -l`-style line itself.

use crate::attrs::SftpAttrs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpName {
    pub filename: String,
    /// v3 only; `None` on v4+, where clients render their own listing
    /// from `attrs` instead.
    pub longname: Option<String>,
    pub attrs: SftpAttrs,
}

impl SftpName {
    pub fn new_v3(filename: impl Into<String>, longname: impl Into<String>, attrs: SftpAttrs) -> Self {
        SftpName {
            filename: filename.into(),
            longname: Some(longname.into()),
            attrs,
        }
    }

    pub fn new(filename: impl Into<String>, attrs: SftpAttrs) -> Self {
        SftpName {
            filename: filename.into(),
            longname: None,
            attrs,
        }
    }
}
