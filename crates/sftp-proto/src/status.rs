//! SFTP status codes (`SSH_FX_*`, §7) carried in `STATUS` responses.

use binrw::binrw;

/// The `SSH_FX_*` taxonomy (§7 "Taxonomy (SFTP)"). Values above a given
/// protocol version's last defined code (see [`StatusCode::max_for_version`])
/// must be downgraded before encoding on that version's wire.
#[binrw]
#[brw(big, repr(u32))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 0,
    Eof = 1,
    NoSuchFile = 2,
    PermissionDenied = 3,
    Failure = 4,
    BadMessage = 5,
    NoConnection = 6,
    ConnectionLost = 7,
    OpUnsupported = 8,
    InvalidHandle = 9,
    NoSuchPath = 10,
    FileAlreadyExists = 11,
    WriteProtect = 12,
    NoMedia = 13,
    NoSpaceOnFilesystem = 14,
    QuotaExceeded = 15,
    UnknownPrincipal = 16,
    LockConflict = 17,
    DirNotEmpty = 18,
    NotADirectory = 19,
    InvalidFilename = 20,
    LinkLoop = 21,
    CannotDelete = 22,
    InvalidParameter = 23,
    FileIsADirectory = 24,
    ByteRangeLockConflict = 25,
    ByteRangeLockRefused = 26,
    DeletePending = 27,
    FileCorrupt = 28,
    OwnerInvalid = 29,
    GroupInvalid = 30,
    NoMatchingByteRangeLock = 31,
}

impl StatusCode {
    /// Highest code defined for a given SFTP protocol version (§7
    /// "Downgrade for older SFTP versions").
    pub fn max_for_version(version: u32) -> u32 {
        match version {
            3 => 8,
            4 => 9,
            5 => 10,
            _ => 31,
        }
    }

    /// Collapses a code that exceeds `version`'s last defined value to
    /// the closest supported one.
    pub fn downgrade_for_version(self, version: u32) -> StatusCode {
        if (self as u32) <= Self::max_for_version(version) {
            return self;
        }
        match self {
            StatusCode::NotADirectory | StatusCode::InvalidFilename | StatusCode::LinkLoop => {
                StatusCode::NoSuchFile
            }
            _ => StatusCode::Failure,
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatusCode::Ok => "Ok",
            StatusCode::Eof => "End of file",
            StatusCode::NoSuchFile => "No such file",
            StatusCode::PermissionDenied => "Permission denied",
            StatusCode::Failure => "Failure",
            StatusCode::BadMessage => "Bad message",
            StatusCode::NoConnection => "No connection",
            StatusCode::ConnectionLost => "Connection lost",
            StatusCode::OpUnsupported => "Operation unsupported",
            StatusCode::InvalidHandle => "Invalid handle",
            StatusCode::NoSuchPath => "No such path",
            StatusCode::FileAlreadyExists => "File already exists",
            StatusCode::WriteProtect => "Write protected filesystem",
            StatusCode::NoMedia => "No media",
            StatusCode::NoSpaceOnFilesystem => "No space on filesystem",
            StatusCode::QuotaExceeded => "Quota exceeded",
            StatusCode::UnknownPrincipal => "Unknown principal",
            StatusCode::LockConflict => "Lock conflict",
            StatusCode::DirNotEmpty => "Directory not empty",
            StatusCode::NotADirectory => "Not a directory",
            StatusCode::InvalidFilename => "Invalid filename",
            StatusCode::LinkLoop => "Link loop",
            StatusCode::CannotDelete => "Cannot delete",
            StatusCode::InvalidParameter => "Invalid parameter",
            StatusCode::FileIsADirectory => "File is a directory",
            StatusCode::ByteRangeLockConflict => "Byte range lock conflict",
            StatusCode::ByteRangeLockRefused => "Byte range lock refused",
            StatusCode::DeletePending => "Delete pending",
            StatusCode::FileCorrupt => "File corrupt",
            StatusCode::OwnerInvalid => "Owner invalid",
            StatusCode::GroupInvalid => "Group invalid",
            StatusCode::NoMatchingByteRangeLock => "No matching byte range lock",
        };
        write!(f, "{s}")
    }
}

/// Maps a host errno to the closest `SSH_FX_*` code (§7 "Server-side
/// errno mapping"). Only the errno values the specification calls out
/// explicitly are matched; anything else is `Failure`.
pub fn from_errno(errno: i32) -> StatusCode {
    match errno {
        libc_like::ENOENT => StatusCode::NoSuchFile,
        libc_like::EACCES => StatusCode::PermissionDenied,
        libc_like::EEXIST => StatusCode::FileAlreadyExists,
        libc_like::EROFS => StatusCode::WriteProtect,
        libc_like::ENOSPC => StatusCode::NoSpaceOnFilesystem,
        libc_like::EDQUOT => StatusCode::QuotaExceeded,
        libc_like::ENOTEMPTY => StatusCode::DirNotEmpty,
        libc_like::ENOTDIR => StatusCode::NotADirectory,
        libc_like::ENAMETOOLONG | libc_like::EILSEQ => StatusCode::InvalidFilename,
        libc_like::ELOOP => StatusCode::LinkLoop,
        libc_like::EINVAL => StatusCode::InvalidParameter,
        libc_like::EISDIR => StatusCode::FileIsADirectory,
        _ => StatusCode::Failure,
    }
}

/// The small subset of POSIX errno values §7's mapping table names,
/// spelled out locally so this crate doesn't need a libc dependency just
/// to read a handful of constants (values match every mainstream POSIX
/// platform Rust targets).
mod libc_like {
    pub const ENOENT: i32 = 2;
    pub const EACCES: i32 = 13;
    pub const EEXIST: i32 = 17;
    pub const ENOTDIR: i32 = 20;
    pub const EISDIR: i32 = 21;
    pub const EINVAL: i32 = 22;
    pub const ENAMETOOLONG: i32 = 36;
    pub const ELOOP: i32 = 40;
    pub const ENOTEMPTY: i32 = 39;
    pub const ENOSPC: i32 = 28;
    pub const EROFS: i32 = 30;
    pub const EDQUOT: i32 = 122;
    pub const EILSEQ: i32 = 84;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downgrades_above_v3_ceiling() {
        assert_eq!(StatusCode::NotADirectory.downgrade_for_version(3), StatusCode::NoSuchFile);
        assert_eq!(StatusCode::Eof.downgrade_for_version(3), StatusCode::Eof);
    }

    #[test]
    fn errno_mapping_matches_table() {
        assert_eq!(from_errno(2), StatusCode::NoSuchFile);
        assert_eq!(from_errno(13), StatusCode::PermissionDenied);
        assert_eq!(from_errno(9999), StatusCode::Failure);
    }
}
