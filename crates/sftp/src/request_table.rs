//! The client's pktid → waiter correlation table (§4.9 "Request
//! correlation"): a monotone id generator plus a map of outstanding
//! requests, resolved by the background dispatch loop as replies arrive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::oneshot;

use sftp_proto::SftpMessage;

#[derive(Default)]
pub struct RequestTable {
    next_id: AtomicU32,
    pending: std::sync::Mutex<HashMap<u32, oneshot::Sender<SftpMessage>>>,
}

impl RequestTable {
    pub fn new() -> Self {
        RequestTable::default()
    }

    /// Allocates the next pktid (wrapping at 2^32, §4.9) and registers a
    /// waiter for its reply.
    pub fn register(&self) -> (u32, oneshot::Receiver<SftpMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);
        (id, rx)
    }

    /// Resolves the waiter for `id` with a reply, if one is still
    /// outstanding. Returns `false` for an id with no registered waiter
    /// (a protocol violation the caller should treat as `SFTPBadMessage`).
    pub fn resolve(&self, id: u32, reply: SftpMessage) -> bool {
        if let Some(tx) = self.pending.lock().unwrap().remove(&id) {
            let _ = tx.send(reply);
            true
        } else {
            false
        }
    }

    /// Cancellation on connection loss (§5): every outstanding waiter is
    /// dropped, which fails its `oneshot::Receiver` with `RecvError`; the
    /// caller observing that maps it to `SftpError::ConnectionLost`.
    pub fn fail_all(&self) {
        self.pending.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sftp_proto::SftpMessage;

    #[tokio::test]
    async fn resolve_delivers_to_registered_waiter() {
        let table = RequestTable::new();
        let (id, rx) = table.register();
        assert!(table.resolve(id, SftpMessage::Handle { id, handle: "h".into() }));
        let msg = rx.await.unwrap();
        assert_eq!(msg, SftpMessage::Handle { id, handle: "h".into() });
    }

    #[test]
    fn resolve_unknown_id_is_noop() {
        let table = RequestTable::new();
        assert!(!table.resolve(999, SftpMessage::Handle { id: 999, handle: "x".into() }));
    }

    #[tokio::test]
    async fn fail_all_drops_waiters() {
        let table = RequestTable::new();
        let (_, rx) = table.register();
        table.fail_all();
        assert!(rx.await.is_err());
    }
}
