//! C6: global-request queue (§4.6). Inbound requests are processed FIFO;
//! outbound requests with `want_reply` register a waiter resolved in the
//! order replies arrive.

use std::collections::VecDeque;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalRequestReply {
    Success(Vec<u8>),
    Failure,
}

/// Inbound FIFO: the connection controller pushes each arriving
/// `GLOBAL_REQUEST` and pops them one at a time, awaiting the handler
/// before processing the next (§4.6, §5 per-handler serialization).
#[derive(Default)]
pub struct InboundGlobalRequests {
    queue: VecDeque<(String, bool, Vec<u8>)>,
}

impl InboundGlobalRequests {
    pub fn push(&mut self, name: String, want_reply: bool, data: Vec<u8>) {
        self.queue.push_back((name, want_reply, data));
    }

    pub fn pop(&mut self) -> Option<(String, bool, Vec<u8>)> {
        self.queue.pop_front()
    }
}

/// Outbound waiters, matched to `REQUEST_SUCCESS`/`REQUEST_FAILURE` in
/// strict send order (§4.6).
#[derive(Default)]
pub struct OutboundGlobalRequests {
    waiters: VecDeque<oneshot::Sender<GlobalRequestReply>>,
}

impl OutboundGlobalRequests {
    pub fn register(&mut self) -> oneshot::Receiver<GlobalRequestReply> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        rx
    }

    /// Resolves the oldest outstanding waiter with `reply`. Returns
    /// `false` if no waiter was outstanding (a protocol violation by the
    /// peer — more replies than requests).
    pub fn resolve_next(&mut self, reply: GlobalRequestReply) -> bool {
        if let Some(tx) = self.waiters.pop_front() {
            let _ = tx.send(reply);
            true
        } else {
            false
        }
    }

    /// Cancellation (§5): every outstanding waiter resolves to failure.
    pub fn fail_all(&mut self) {
        while let Some(tx) = self.waiters.pop_front() {
            let _ = tx.send(GlobalRequestReply::Failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_is_fifo() {
        let mut q = InboundGlobalRequests::default();
        q.push("a".into(), false, vec![]);
        q.push("b".into(), false, vec![]);
        assert_eq!(q.pop().unwrap().0, "a");
        assert_eq!(q.pop().unwrap().0, "b");
    }

    #[tokio::test]
    async fn outbound_resolves_in_registration_order() {
        let mut q = OutboundGlobalRequests::default();
        let first = q.register();
        let second = q.register();
        assert!(q.resolve_next(GlobalRequestReply::Success(vec![1])));
        assert!(q.resolve_next(GlobalRequestReply::Failure));
        assert_eq!(first.await.unwrap(), GlobalRequestReply::Success(vec![1]));
        assert_eq!(second.await.unwrap(), GlobalRequestReply::Failure);
    }
}
