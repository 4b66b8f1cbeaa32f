use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use tracing::debug;

use crate::completion::{completion, Completer, Completion};
use crate::error::{Result, SessionError};
use crate::registry::SessionId;

/// What happened to an inbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Handed to a waiting receive.
    Delivered,
    /// Queued for a later receive.
    Buffered,
    /// Dropped: nobody was waiting and the session is not registered.
    Discarded,
}

/// What [`ReceiveMux::purge`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Purged {
    /// Buffered datagrams dropped.
    pub dropped: usize,
    /// Whether a waiting receive was canceled.
    pub waiter: bool,
}

/// Per-session reconciliation of waiting receivers and buffered datagrams.
///
/// A session has either a live waiter or queued datagrams, never both: an
/// arrival always goes to a live waiter first, and a receive always drains
/// the queue first.
///
/// A waiter whose [`Completion`] was dropped is abandoned. It no longer
/// blocks a new receive and never swallows an arrival.
#[derive(Debug, Default)]
pub struct ReceiveMux {
    waiting: HashMap<SessionId, Completer<Bytes>>,
    buffered: HashMap<SessionId, VecDeque<Bytes>>,
}

impl ReceiveMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next datagram for a session.
    ///
    /// Returns an already-resolved completion when a datagram is buffered,
    /// otherwise registers a waiter. Fails with
    /// [`SessionError::AlreadyListening`] if a live waiter exists.
    pub fn await_next(&mut self, id: SessionId) -> Result<Completion<Bytes>> {
        if let Some(datagram) = self.pop_buffered(id) {
            return Ok(Completion::ready(datagram));
        }

        if let Some(waiter) = self.waiting.get(&id) {
            if !waiter.is_abandoned() {
                return Err(SessionError::AlreadyListening(id));
            }
            debug!(session = %id, "replacing abandoned receive");
        }

        let (completer, completion) = completion();
        self.waiting.insert(id, completer);
        Ok(completion)
    }

    /// Route an inbound datagram.
    ///
    /// `known` says whether the session is registered; datagrams for
    /// unregistered sessions are only ever handed to a waiter, never queued.
    pub fn on_arrival(&mut self, id: SessionId, datagram: Bytes, known: bool) -> Arrival {
        let datagram = match self.waiting.remove(&id) {
            Some(waiter) => match waiter.complete(datagram) {
                Ok(()) => return Arrival::Delivered,
                Err(datagram) => datagram,
            },
            None => datagram,
        };

        if known {
            self.buffered.entry(id).or_default().push_back(datagram);
            Arrival::Buffered
        } else {
            Arrival::Discarded
        }
    }

    /// Drop all receive state of a session. A waiting receive resolves as
    /// canceled.
    pub fn purge(&mut self, id: SessionId) -> Purged {
        Purged {
            dropped: self.buffered.remove(&id).map_or(0, |queue| queue.len()),
            waiter: self
                .waiting
                .remove(&id)
                .is_some_and(|waiter| !waiter.is_abandoned()),
        }
    }

    /// Number of datagrams queued for a session.
    pub fn buffered_len(&self, id: SessionId) -> usize {
        self.buffered.get(&id).map_or(0, VecDeque::len)
    }

    pub fn has_buffered(&self, id: SessionId) -> bool {
        self.buffered.contains_key(&id)
    }

    /// True when a live receive is waiting on the session.
    pub fn is_waiting(&self, id: SessionId) -> bool {
        self.waiting
            .get(&id)
            .is_some_and(|waiter| !waiter.is_abandoned())
    }

    fn pop_buffered(&mut self, id: SessionId) -> Option<Bytes> {
        let queue = self.buffered.get_mut(&id)?;
        let datagram = queue.pop_front();
        if queue.is_empty() {
            self.buffered.remove(&id);
        }
        datagram
    }
}

#[cfg(test)]
mod tests {
    use futures_util::FutureExt;

    use super::*;
    use crate::completion::Canceled;

    const S1: SessionId = SessionId::new(1);
    const S2: SessionId = SessionId::new(2);

    fn d(bytes: &'static [u8]) -> Bytes {
        Bytes::from_static(bytes)
    }

    #[test]
    fn buffered_datagrams_come_out_in_order() {
        let mut mux = ReceiveMux::new();
        assert_eq!(mux.on_arrival(S1, d(b"one"), true), Arrival::Buffered);
        assert_eq!(mux.on_arrival(S1, d(b"two"), true), Arrival::Buffered);
        assert_eq!(mux.buffered_len(S1), 2);

        let first = mux.await_next(S1).unwrap().now_or_never();
        let second = mux.await_next(S1).unwrap().now_or_never();
        assert_eq!(first, Some(Ok(d(b"one"))));
        assert_eq!(second, Some(Ok(d(b"two"))));
        assert!(!mux.has_buffered(S1));
    }

    #[test]
    fn arrival_resolves_waiter_without_buffering() {
        let mut mux = ReceiveMux::new();
        let mut waiting = mux.await_next(S1).unwrap();
        assert!((&mut waiting).now_or_never().is_none());
        assert!(mux.is_waiting(S1));

        assert_eq!(mux.on_arrival(S1, d(b"x"), true), Arrival::Delivered);
        assert_eq!(waiting.now_or_never(), Some(Ok(d(b"x"))));
        assert!(!mux.is_waiting(S1));
        assert_eq!(mux.buffered_len(S1), 0);
    }

    #[test]
    fn second_waiter_conflicts() {
        let mut mux = ReceiveMux::new();
        let _first = mux.await_next(S1).unwrap();
        let err = mux.await_next(S1).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyListening(id) if id == S1));

        // Other sessions are independent.
        assert!(mux.await_next(S2).is_ok());
    }

    #[test]
    fn waiter_is_resolved_even_for_unregistered_session() {
        let mut mux = ReceiveMux::new();
        let waiting = mux.await_next(S1).unwrap();
        assert_eq!(mux.on_arrival(S1, d(b"late"), false), Arrival::Delivered);
        assert_eq!(waiting.now_or_never(), Some(Ok(d(b"late"))));
    }

    #[test]
    fn unknown_session_is_discarded() {
        let mut mux = ReceiveMux::new();
        assert_eq!(mux.on_arrival(S2, d(b"?"), false), Arrival::Discarded);
        assert!(!mux.has_buffered(S2));
        assert!(!mux.is_waiting(S2));
    }

    #[test]
    fn abandoned_waiter_is_replaced() {
        let mut mux = ReceiveMux::new();
        drop(mux.await_next(S1).unwrap());
        assert!(!mux.is_waiting(S1));
        assert!(mux.await_next(S1).is_ok());
    }

    #[test]
    fn abandoned_waiter_does_not_swallow_arrival() {
        let mut mux = ReceiveMux::new();
        drop(mux.await_next(S1).unwrap());
        assert_eq!(mux.on_arrival(S1, d(b"kept"), true), Arrival::Buffered);
        assert_eq!(
            mux.await_next(S1).unwrap().now_or_never(),
            Some(Ok(d(b"kept")))
        );
    }

    #[test]
    fn purge_drops_queue_and_cancels_waiter() {
        let mut mux = ReceiveMux::new();
        mux.on_arrival(S1, d(b"a"), true);
        mux.on_arrival(S1, d(b"b"), true);
        assert_eq!(
            mux.purge(S1),
            Purged {
                dropped: 2,
                waiter: false
            }
        );

        let waiting = mux.await_next(S1).unwrap();
        assert_eq!(
            mux.purge(S1),
            Purged {
                dropped: 0,
                waiter: true
            }
        );
        assert_eq!(waiting.now_or_never(), Some(Err(Canceled)));
        assert_eq!(mux.purge(S1), Purged::default());
    }
}
