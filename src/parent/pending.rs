//! Pending-reply bookkeeping and request-id assignment.
//!
//! In blocking mode the child answers strictly in request order, so the
//! pending set is an ordered queue; the response id is still parsed and a
//! mismatch against the queue front is a protocol failure. In cooperative
//! mode responses may arrive in any order, so the set is keyed by id.

use std::collections::{HashMap, VecDeque};

use crate::error::{ForkwireError, Result};
use crate::parent::Mode;
use crate::protocol::EVENT_ID;
use crate::serializer::Args;

/// Reply callback stored per in-flight request.
pub type ReplyFn = Box<dyn FnOnce(Args) + Send>;

/// The parent's table of reply callbacks awaiting response frames.
pub enum PendingSet {
    /// Blocking mode: responses arrive in submission order.
    Queue(VecDeque<(u32, ReplyFn)>),
    /// Cooperative mode: responses arrive in any order.
    Map(HashMap<u32, ReplyFn>),
}

impl PendingSet {
    pub fn new(mode: Mode) -> Self {
        match mode {
            Mode::Blocking => Self::Queue(VecDeque::new()),
            Mode::Cooperative => Self::Map(HashMap::new()),
        }
    }

    pub fn insert(&mut self, id: u32, reply: ReplyFn) {
        match self {
            Self::Queue(queue) => queue.push_back((id, reply)),
            Self::Map(map) => {
                map.insert(id, reply);
            }
        }
    }

    /// Pop the callback matching a received response frame.
    ///
    /// Unknown ids, and FIFO violations in blocking mode, are protocol
    /// failures.
    pub fn complete(&mut self, id: u32) -> Result<ReplyFn> {
        match self {
            Self::Queue(queue) => match queue.pop_front() {
                Some((expected, reply)) if expected == id => Ok(reply),
                Some((expected, _)) => Err(ForkwireError::Protocol(format!(
                    "unexpected data from child (response id {} while {} was due)",
                    id, expected
                ))),
                None => Err(ForkwireError::Protocol(
                    "unexpected data from child".to_string(),
                )),
            },
            Self::Map(map) => map.remove(&id).ok_or_else(|| {
                ForkwireError::Protocol("unexpected data from child".to_string())
            }),
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        match self {
            Self::Queue(queue) => queue.iter().any(|(pending, _)| *pending == id),
            Self::Map(map) => map.contains_key(&id),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Queue(queue) => queue.len(),
            Self::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored callback without invoking it (terminal error
    /// path: orphaned replies are never delivered).
    pub fn clear(&mut self) {
        match self {
            Self::Queue(queue) => queue.clear(),
            Self::Map(map) => map.clear(),
        }
    }
}

/// Request-id allocator: monotonic increment modulo 2^32, skipping the
/// event sentinel 0 and any id still in flight. The skip loop is bounded
/// by the pending-set size.
pub struct IdAlloc {
    next: u32,
}

impl IdAlloc {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self, pending: &PendingSet) -> u32 {
        loop {
            let id = self.next;
            self.next = self.next.wrapping_add(1);
            if id != EVENT_ID && !pending.contains(id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> ReplyFn {
        Box::new(|_| {})
    }

    #[test]
    fn test_pending_conservation() {
        let mut pending = PendingSet::new(Mode::Cooperative);
        for id in 1..=8u32 {
            pending.insert(id, noop());
        }
        assert_eq!(pending.len(), 8);

        for id in [3u32, 1, 8] {
            pending.complete(id).unwrap();
        }
        assert_eq!(pending.len(), 5);

        pending.clear();
        assert!(pending.is_empty());
    }

    #[test]
    fn test_map_unknown_id_is_protocol_error() {
        let mut pending = PendingSet::new(Mode::Cooperative);
        pending.insert(1, noop());
        assert!(matches!(
            pending.complete(2),
            Err(ForkwireError::Protocol(_))
        ));
    }

    #[test]
    fn test_queue_fifo_order() {
        let mut pending = PendingSet::new(Mode::Blocking);
        pending.insert(1, noop());
        pending.insert(2, noop());

        pending.complete(1).unwrap();
        pending.complete(2).unwrap();
        assert!(pending.is_empty());
    }

    #[test]
    fn test_queue_mismatch_is_protocol_error() {
        let mut pending = PendingSet::new(Mode::Blocking);
        pending.insert(1, noop());
        pending.insert(2, noop());

        assert!(matches!(
            pending.complete(2),
            Err(ForkwireError::Protocol(_))
        ));
    }

    #[test]
    fn test_id_alloc_skips_zero() {
        let mut ids = IdAlloc::new();
        let pending = PendingSet::new(Mode::Cooperative);

        ids.next = u32::MAX;
        assert_eq!(ids.next_id(&pending), u32::MAX);
        // Wraps past the reserved 0.
        assert_eq!(ids.next_id(&pending), 1);
    }

    #[test]
    fn test_id_alloc_skips_pending() {
        let mut ids = IdAlloc::new();
        let mut pending = PendingSet::new(Mode::Cooperative);

        assert_eq!(ids.next_id(&pending), 1);
        pending.insert(1, noop());

        ids.next = 1;
        assert_eq!(ids.next_id(&pending), 2);
    }
}
