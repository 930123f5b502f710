//! The SFTP server engine (C10, §4.10): version negotiation, per-type
//! dispatch over a real filesystem (optionally chrooted), the handle
//! table, and readdir streaming.
//!
//! Grounded on `asyncssh.sftp.SFTPServerHandler`'s dispatch-by-type loop
//! and errno→`SSH_FX_*` mapping, built here against `tokio::fs` instead
//! of a synchronous filesystem layer.

use std::path::PathBuf;
use std::sync::Arc;

use sftp_proto::packet::{FXF_APPEND, FXF_CREAT, FXF_EXCL, FXF_READ, FXF_TRUNC, FXF_WRITE};
use sftp_proto::{FileType, SftpAttrs, SftpMessage, SftpName, StatusCode, MAX_VERSION, MIN_VERSION};

use crate::channel::{SftpSink, SftpSource};
use crate::chroot::ChrootMapper;
use crate::config::SftpConfig;
use crate::error::{Result, SftpError};
use crate::handle_table::{DirHandle, HandleTable, OpenHandle};

const READDIR_BATCH: usize = 128;

pub struct SftpServer {
    sink: Arc<dyn SftpSink>,
    chroot: Option<ChrootMapper>,
    version: u32,
    max_version: u32,
    handles: HandleTable,
}

impl SftpServer {
    pub fn new(sink: Arc<dyn SftpSink>, chroot_root: Option<PathBuf>) -> Self {
        Self::with_config(sink, chroot_root, SftpConfig::default())
    }

    pub fn with_config(sink: Arc<dyn SftpSink>, chroot_root: Option<PathBuf>, config: SftpConfig) -> Self {
        SftpServer {
            sink,
            chroot: chroot_root.map(ChrootMapper::new),
            version: MIN_VERSION,
            max_version: config.max_version.clamp(MIN_VERSION, MAX_VERSION),
            handles: HandleTable::new(),
        }
    }

    fn resolve(&self, virtual_path: &str) -> Result<PathBuf> {
        match &self.chroot {
            Some(mapper) => mapper.map_in(virtual_path),
            None => Ok(PathBuf::from(virtual_path)),
        }
    }

    /// REALPATH's resolution step (§4.10, property 17): unlike `resolve`,
    /// never errors on a path that climbs above a configured root — it
    /// clamps. With no chroot configured there's no root to escape, so
    /// this is the same as `resolve`.
    fn resolve_for_realpath(&self, virtual_path: &str) -> PathBuf {
        match &self.chroot {
            Some(mapper) => mapper.map_in_for_realpath(virtual_path),
            None => PathBuf::from(virtual_path),
        }
    }

    fn unresolve(&self, real_path: &std::path::Path) -> Result<String> {
        match &self.chroot {
            Some(mapper) => mapper.map_out(real_path),
            None => Ok(real_path.to_string_lossy().into_owned()),
        }
    }

    /// Runs the handshake then the request/response loop until the peer
    /// closes the channel (§5 "Ordering guarantees": responses are sent
    /// in the order their requests completed processing, one at a time,
    /// since dispatch here is not pipelined on the server side).
    pub async fn serve(mut self, mut source: Box<dyn SftpSource>) -> Result<()> {
        let raw = source.recv().await?.ok_or(SftpError::ConnectionLost)?;
        let msg = SftpMessage::decode(&raw, MIN_VERSION)?;
        let client_version = match msg {
            SftpMessage::Init { version, .. } => version,
            other => return Err(SftpError::BadMessage(format!("expected INIT, got {other:?}"))),
        };
        self.version = client_version.clamp(MIN_VERSION, self.max_version);

        let version_reply = SftpMessage::Version {
            version: self.version,
            extensions: self.advertised_extensions(),
        };
        self.sink.send(version_reply.encode(self.version)?).await?;

        loop {
            let raw = match source.recv().await {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(_) => break,
            };
            let reply = match SftpMessage::decode(&raw, self.version) {
                Ok(msg) => self.dispatch(msg).await,
                Err(e) => SftpMessage::Status { id: 0, code: StatusCode::BadMessage, message: e.to_string(), language_tag: String::new() },
            };
            self.sink.send(reply.encode(self.version)?).await?;
        }
        Ok(())
    }

    fn advertised_extensions(&self) -> Vec<(String, Vec<u8>)> {
        let mut extensions = vec![
            ("newline".to_string(), b"\n".to_vec()),
            ("vendor-id".to_string(), b"ssh-rs".to_vec()),
            ("posix-rename@openssh.com".to_string(), b"1".to_vec()),
            ("hardlink@openssh.com".to_string(), b"1".to_vec()),
            ("fsync@openssh.com".to_string(), b"1".to_vec()),
            ("lsetstat@openssh.com".to_string(), b"1".to_vec()),
            ("limits@openssh.com".to_string(), b"1".to_vec()),
            ("copy-data".to_string(), b"1".to_vec()),
        ];
        if self.version >= 5 {
            // `supported`/`supported2` blobs (§4.10) describe attribute
            // and open-flag masks; a minimal but well-formed blob is
            // emitted so clients that parse it don't choke, without
            // claiming support for ACLs this server doesn't enforce.
            let mut supported = Vec::new();
            supported.extend_from_slice(&0u32.to_be_bytes()); // attribute-mask
            supported.extend_from_slice(&0u32.to_be_bytes()); // attrib-bits mask
            supported.extend_from_slice(&(FXF_READ | FXF_WRITE | FXF_CREAT | FXF_TRUNC | FXF_EXCL).to_be_bytes());
            supported.extend_from_slice(&0u32.to_be_bytes()); // access mask
            supported.extend_from_slice(&4u32.to_be_bytes()); // max-read-size (placeholder unit)
            supported.extend_from_slice(&0u16.to_be_bytes()); // open-block-vector
            supported.extend_from_slice(&0u16.to_be_bytes()); // block-vector
            supported.extend_from_slice(&0u32.to_be_bytes()); // attrib-extension-count
            supported.extend_from_slice(&0u32.to_be_bytes()); // extension-count
            extensions.push(("supported".to_string(), supported));
        }
        extensions
    }

    async fn dispatch(&self, msg: SftpMessage) -> SftpMessage {
        let id = msg.request_id().unwrap_or(0);
        let result = self.dispatch_inner(msg).await;
        match result {
            Ok(reply) => reply,
            Err(e) => {
                let code = status_for_error(&e, self.version);
                SftpMessage::Status { id, code, message: e.to_string(), language_tag: String::new() }
            }
        }
    }

    async fn dispatch_inner(&self, msg: SftpMessage) -> Result<SftpMessage> {
        Ok(match msg {
            SftpMessage::Open { id, path, pflags, attrs } => self.handle_open(id, &path, pflags, attrs).await?,
            SftpMessage::Close { id, handle } => {
                if self.handles.close(&handle).await {
                    ok_status(id)
                } else {
                    return Err(SftpError::from_status(StatusCode::InvalidHandle, "unknown handle".into()));
                }
            }
            SftpMessage::Read { id, handle, offset, len } => self.handle_read(id, &handle, offset, len).await?,
            SftpMessage::Write { id, handle, offset, data } => self.handle_write(id, &handle, offset, &data).await?,
            SftpMessage::Lstat { id, path } => self.handle_stat(id, &path, false).await?,
            SftpMessage::Stat { id, path } => self.handle_stat(id, &path, true).await?,
            SftpMessage::Fstat { id, handle } => self.handle_fstat(id, &handle).await?,
            SftpMessage::Setstat { id, path, attrs } => self.handle_setstat(id, &path, attrs).await?,
            SftpMessage::Fsetstat { id, handle, attrs } => self.handle_fsetstat(id, &handle, attrs).await?,
            SftpMessage::Opendir { id, path } => self.handle_opendir(id, &path).await?,
            SftpMessage::Readdir { id, handle } => self.handle_readdir(id, &handle).await?,
            SftpMessage::Remove { id, path } => {
                tokio::fs::remove_file(self.resolve(&path)?).await?;
                ok_status(id)
            }
            SftpMessage::Mkdir { id, path, attrs } => self.handle_mkdir(id, &path, attrs).await?,
            SftpMessage::Rmdir { id, path } => {
                tokio::fs::remove_dir(self.resolve(&path)?).await?;
                ok_status(id)
            }
            SftpMessage::Realpath { id, path } => self.handle_realpath(id, &path).await?,
            SftpMessage::Rename { id, oldpath, newpath, .. } => {
                tokio::fs::rename(self.resolve(&oldpath)?, self.resolve(&newpath)?).await?;
                ok_status(id)
            }
            SftpMessage::Readlink { id, path } => self.handle_readlink(id, &path).await?,
            SftpMessage::Symlink { id, linkpath, targetpath } => self.handle_symlink(id, &linkpath, &targetpath).await?,
            SftpMessage::Extended { id, request, data } => self.handle_extended(id, &request, &data).await?,
            other => {
                return Err(SftpError::BadMessage(format!("unexpected request shape: {other:?}")));
            }
        })
    }

    async fn handle_open(&self, id: u32, path: &str, pflags: u32, attrs: SftpAttrs) -> Result<SftpMessage> {
        let real = self.resolve(path)?;
        let mut options = tokio::fs::OpenOptions::new();
        options.read(pflags & FXF_READ != 0 || pflags & (FXF_WRITE | FXF_READ) == 0);
        options.write(pflags & FXF_WRITE != 0);
        options.append(pflags & FXF_APPEND != 0);
        options.create(pflags & FXF_CREAT != 0);
        options.truncate(pflags & FXF_TRUNC != 0);
        options.create_new(pflags & FXF_EXCL != 0 && pflags & FXF_CREAT != 0);
        if let Some(perm) = attrs.permissions {
            apply_new_file_mode(&mut options, perm);
        }
        let file = options.open(&real).await?;
        let handle = self.handles.insert(OpenHandle::File(file)).await;
        Ok(SftpMessage::Handle { id, handle })
    }

    async fn handle_read(&self, id: u32, handle: &str, offset: u64, len: u32) -> Result<SftpMessage> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};
        let hid = u32::from_str_radix(handle, 16)
            .map_err(|_| SftpError::from_status(StatusCode::InvalidHandle, "unknown handle".into()))?;
        let mut guard = self.lock_handles().await;
        let OpenHandle::File(file) = guard
            .get_mut(&hid)
            .ok_or_else(|| SftpError::from_status(StatusCode::InvalidHandle, "unknown handle".into()))?
        else {
            return Err(SftpError::from_status(StatusCode::InvalidHandle, "handle is a directory".into()));
        };
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len as usize];
        let n = file.read(&mut buf).await?;
        if n == 0 && len > 0 {
            return Err(SftpError::from_status(StatusCode::Eof, "end of file".into()));
        }
        buf.truncate(n);
        Ok(SftpMessage::Data { id, data: buf, end_of_file: None })
    }

    async fn lock_handles(&self) -> tokio::sync::MutexGuard<'_, std::collections::HashMap<u32, OpenHandle>> {
        self.handles.raw_lock().await
    }

    async fn handle_write(&self, id: u32, handle: &str, offset: u64, data: &[u8]) -> Result<SftpMessage> {
        use tokio::io::{AsyncSeekExt, AsyncWriteExt};
        let hid = u32::from_str_radix(handle, 16)
            .map_err(|_| SftpError::from_status(StatusCode::InvalidHandle, "unknown handle".into()))?;
        let mut guard = self.lock_handles().await;
        let OpenHandle::File(file) = guard
            .get_mut(&hid)
            .ok_or_else(|| SftpError::from_status(StatusCode::InvalidHandle, "unknown handle".into()))?
        else {
            return Err(SftpError::from_status(StatusCode::InvalidHandle, "handle is a directory".into()));
        };
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        Ok(ok_status(id))
    }

    async fn handle_stat(&self, id: u32, path: &str, follow: bool) -> Result<SftpMessage> {
        let real = self.resolve(path)?;
        let meta = if follow {
            tokio::fs::metadata(&real).await?
        } else {
            tokio::fs::symlink_metadata(&real).await?
        };
        Ok(SftpMessage::Attrs { id, attrs: attrs_from_metadata(&meta) })
    }

    async fn handle_fstat(&self, id: u32, handle: &str) -> Result<SftpMessage> {
        let hid = u32::from_str_radix(handle, 16)
            .map_err(|_| SftpError::from_status(StatusCode::InvalidHandle, "unknown handle".into()))?;
        let guard = self.lock_handles().await;
        let OpenHandle::File(file) = guard.get(&hid).ok_or_else(|| {
            SftpError::from_status(StatusCode::InvalidHandle, "unknown handle".into())
        })? else {
            return Err(SftpError::from_status(StatusCode::InvalidHandle, "handle is a directory".into()));
        };
        let meta = file.metadata().await?;
        Ok(SftpMessage::Attrs { id, attrs: attrs_from_metadata(&meta) })
    }

    async fn handle_setstat(&self, id: u32, path: &str, attrs: SftpAttrs) -> Result<SftpMessage> {
        let real = self.resolve(path)?;
        apply_attrs_to_path(&real, &attrs).await?;
        Ok(ok_status(id))
    }

    async fn handle_fsetstat(&self, id: u32, handle: &str, attrs: SftpAttrs) -> Result<SftpMessage> {
        let hid = u32::from_str_radix(handle, 16)
            .map_err(|_| SftpError::from_status(StatusCode::InvalidHandle, "unknown handle".into()))?;
        let guard = self.lock_handles().await;
        let OpenHandle::File(file) = guard
            .get(&hid)
            .ok_or_else(|| SftpError::from_status(StatusCode::InvalidHandle, "unknown handle".into()))?
        else {
            return Err(SftpError::from_status(StatusCode::InvalidHandle, "handle is a directory".into()));
        };
        if let Some(perm) = attrs.permissions {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(std::fs::Permissions::from_mode(perm)).await?;
            }
        }
        Ok(ok_status(id))
    }

    async fn handle_opendir(&self, id: u32, path: &str) -> Result<SftpMessage> {
        let real = self.resolve(path)?;
        let meta = tokio::fs::metadata(&real).await?;
        if !meta.is_dir() {
            return Err(SftpError::from_status(StatusCode::NotADirectory, "not a directory".into()));
        }
        let handle = self
            .handles
            .insert(OpenHandle::Dir(DirHandle { path: real, pending: Default::default(), exhausted: false }))
            .await;
        Ok(SftpMessage::Handle { id, handle })
    }

    async fn handle_readdir(&self, id: u32, handle: &str) -> Result<SftpMessage> {
        let hid = u32::from_str_radix(handle, 16)
            .map_err(|_| SftpError::from_status(StatusCode::InvalidHandle, "unknown handle".into()))?;
        let mut guard = self.lock_handles().await;
        let OpenHandle::Dir(dir) = guard
            .get_mut(&hid)
            .ok_or_else(|| SftpError::from_status(StatusCode::InvalidHandle, "unknown handle".into()))?
        else {
            return Err(SftpError::from_status(StatusCode::InvalidHandle, "handle is a file".into()));
        };

        if dir.pending.is_empty() && !dir.exhausted {
            let mut read_dir = tokio::fs::read_dir(&dir.path).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let meta = entry.metadata().await?;
                dir.pending.push_back(SftpName::new_v3(
                    entry.file_name().to_string_lossy().into_owned(),
                    format_longname(&entry.file_name().to_string_lossy(), &meta),
                    attrs_from_metadata(&meta),
                ));
            }
            dir.exhausted = true;
        }

        if dir.pending.is_empty() {
            return Err(SftpError::from_status(StatusCode::Eof, "end of directory".into()));
        }
        let mut batch = Vec::new();
        while batch.len() < READDIR_BATCH {
            let Some(name) = dir.pending.pop_front() else { break };
            batch.push(name);
        }
        Ok(SftpMessage::Name { id, names: batch })
    }

    async fn handle_mkdir(&self, id: u32, path: &str, attrs: SftpAttrs) -> Result<SftpMessage> {
        let real = self.resolve(path)?;
        tokio::fs::create_dir(&real).await?;
        if attrs.permissions.is_some() {
            apply_attrs_to_path(&real, &attrs).await?;
        }
        Ok(ok_status(id))
    }

    async fn handle_realpath(&self, id: u32, path: &str) -> Result<SftpMessage> {
        let real = self.resolve_for_realpath(path);
        let canonical = tokio::fs::canonicalize(&real).await.unwrap_or(real);
        let virtual_path = self.unresolve(&canonical).unwrap_or_else(|_| "/".to_string());
        Ok(SftpMessage::Name {
            id,
            names: vec![SftpName::new_v3(virtual_path.clone(), virtual_path, SftpAttrs::default())],
        })
    }

    async fn handle_readlink(&self, id: u32, path: &str) -> Result<SftpMessage> {
        let real = self.resolve(path)?;
        let target = tokio::fs::read_link(&real).await?;
        Ok(SftpMessage::Name {
            id,
            names: vec![SftpName::new_v3(target.to_string_lossy().into_owned(), target.to_string_lossy().into_owned(), SftpAttrs::default())],
        })
    }

    async fn handle_symlink(&self, id: u32, linkpath: &str, targetpath: &str) -> Result<SftpMessage> {
        let real_link = self.resolve(linkpath)?;
        let target = match &self.chroot {
            Some(mapper) => {
                let parent = real_link.parent().unwrap_or(&real_link).to_path_buf();
                mapper.confine_symlink_target(targetpath, &parent)
            }
            None => targetpath.to_string(),
        };
        #[cfg(unix)]
        tokio::fs::symlink(&target, &real_link).await?;
        Ok(ok_status(id))
    }

    async fn handle_extended(&self, id: u32, request: &str, _data: &[u8]) -> Result<SftpMessage> {
        match request {
            "limits@openssh.com" => {
                let mut data = Vec::new();
                data.extend_from_slice(&(4u64 * 1024 * 1024 + 1024).to_be_bytes());
                data.extend_from_slice(&(4u64 * 1024 * 1024).to_be_bytes());
                data.extend_from_slice(&(4u64 * 1024 * 1024).to_be_bytes());
                data.extend_from_slice(&0u64.to_be_bytes());
                Ok(SftpMessage::ExtendedReply { id, data })
            }
            _ => Err(SftpError::from_status(StatusCode::OpUnsupported, format!("unsupported extension {request}"))),
        }
    }
}

fn ok_status(id: u32) -> SftpMessage {
    SftpMessage::Status { id, code: StatusCode::Ok, message: "ok".into(), language_tag: String::new() }
}

fn status_for_error(e: &SftpError, version: u32) -> StatusCode {
    match e {
        SftpError::Status { code, .. } => code.downgrade_for_version(version),
        SftpError::Io(io) => io
            .raw_os_error()
            .map(sftp_proto::status::from_errno)
            .unwrap_or(StatusCode::Failure)
            .downgrade_for_version(version),
        _ => StatusCode::Failure,
    }
}

fn attrs_from_metadata(meta: &std::fs::Metadata) -> SftpAttrs {
    let file_type = if meta.is_dir() {
        FileType::Directory
    } else if meta.is_symlink() {
        FileType::Symlink
    } else if meta.is_file() {
        FileType::Regular
    } else {
        FileType::Unknown
    };
    #[cfg(unix)]
    let permissions = {
        use std::os::unix::fs::PermissionsExt;
        Some(meta.permissions().mode())
    };
    #[cfg(not(unix))]
    let permissions = None;

    #[cfg(unix)]
    let (uid, gid) = {
        use std::os::unix::fs::MetadataExt;
        (Some(meta.uid()), Some(meta.gid()))
    };
    #[cfg(not(unix))]
    let (uid, gid) = (None, None);

    SftpAttrs {
        file_type: Some(file_type),
        size: Some(meta.len()),
        uid,
        gid,
        permissions,
        ..Default::default()
    }
}

fn format_longname(name: &str, meta: &std::fs::Metadata) -> String {
    let kind = if meta.is_dir() { 'd' } else if meta.is_symlink() { 'l' } else { '-' };
    format!("{kind}rwxr-xr-x 1 owner group {:>10} {name}", meta.len())
}

fn apply_new_file_mode(options: &mut tokio::fs::OpenOptions, _mode: u32) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(_mode);
    }
    let _ = options;
}

async fn apply_attrs_to_path(path: &std::path::Path, attrs: &SftpAttrs) -> Result<()> {
    if let Some(perm) = attrs.permissions {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(perm)).await?;
        }
        #[cfg(not(unix))]
        let _ = perm;
    }
    Ok(())
}
