//! The server's handle table (§4.10 "Handles"): a monotonically
//! increasing counter projected to an opaque (here: hex-encoded, always
//! valid UTF-8) handle string, with two separate tables for open files
//! and open directory iterators. `CLOSE` accepts either.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use tokio::fs::File;
use tokio::sync::Mutex;

use sftp_proto::SftpName;

pub struct DirHandle {
    pub path: PathBuf,
    /// Entries already read from the filesystem but not yet delivered
    /// to the client across `READDIR` calls (§4.10 "Readdir streaming":
    /// up to 128 per response).
    pub pending: VecDeque<SftpName>,
    pub exhausted: bool,
}

pub enum OpenHandle {
    File(File),
    Dir(DirHandle),
}

#[derive(Default)]
pub struct HandleTable {
    next: std::sync::atomic::AtomicU32,
    handles: Mutex<HashMap<u32, OpenHandle>>,
}

impl HandleTable {
    pub fn new() -> Self {
        HandleTable::default()
    }

    fn allocate_id(&self, in_use: &HashMap<u32, OpenHandle>) -> u32 {
        loop {
            let candidate = self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            if !in_use.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    pub async fn insert(&self, handle: OpenHandle) -> String {
        let mut guard = self.handles.lock().await;
        let id = self.allocate_id(&guard);
        guard.insert(id, handle);
        format!("{id:08x}")
    }

    fn parse(handle: &str) -> Option<u32> {
        u32::from_str_radix(handle, 16).ok()
    }

    pub async fn with_file_mut<R>(&self, handle: &str, f: impl FnOnce(&mut File) -> R) -> Option<R> {
        let id = Self::parse(handle)?;
        let mut guard = self.handles.lock().await;
        match guard.get_mut(&id)? {
            OpenHandle::File(file) => Some(f(file)),
            OpenHandle::Dir(_) => None,
        }
    }

    pub async fn with_dir_mut<R>(&self, handle: &str, f: impl FnOnce(&mut DirHandle) -> R) -> Option<R> {
        let id = Self::parse(handle)?;
        let mut guard = self.handles.lock().await;
        match guard.get_mut(&id)? {
            OpenHandle::Dir(dir) => Some(f(dir)),
            OpenHandle::File(_) => None,
        }
    }

    /// Removes either a file or directory handle; `true` if one existed.
    pub async fn close(&self, handle: &str) -> bool {
        let Some(id) = Self::parse(handle) else { return false };
        self.handles.lock().await.remove(&id).is_some()
    }

    pub fn parse_id(handle: &str) -> Option<u32> {
        Self::parse(handle)
    }

    /// Direct access to the underlying map for callers that need to hold
    /// the lock across an `.await` (seek+read/write must be atomic with
    /// respect to concurrent ops on the same handle); `with_file_mut`/
    /// `with_dir_mut` can't express that since their closures are sync.
    pub async fn raw_lock(&self) -> tokio::sync::MutexGuard<'_, HashMap<u32, OpenHandle>> {
        self.handles.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allocated_ids_are_unique_hex_strings() {
        let table = HandleTable::new();
        let a = table.insert(OpenHandle::Dir(DirHandle { path: "/".into(), pending: Default::default(), exhausted: false })).await;
        let b = table.insert(OpenHandle::Dir(DirHandle { path: "/".into(), pending: Default::default(), exhausted: false })).await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn close_accepts_either_table() {
        let table = HandleTable::new();
        let h = table.insert(OpenHandle::Dir(DirHandle { path: "/".into(), pending: Default::default(), exhausted: false })).await;
        assert!(table.close(&h).await);
        assert!(!table.close(&h).await);
    }

    #[tokio::test]
    async fn unknown_handle_operations_return_none() {
        let table = HandleTable::new();
        assert!(table.with_dir_mut("deadbeef", |_| ()).await.is_none());
    }
}
