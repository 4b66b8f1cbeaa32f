use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use crate::error::{HostError, Result};
use crate::traits::{DatagramHost, Inbound, SocketId};

const EPHEMERAL_START: u16 = 49152;

/// Host operation a [`Fault`] can be armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    Create,
    Bind,
    Send,
    Close,
}

/// A scripted host failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Return this result code instead of performing the call.
    /// For `create` and `close`, which have no code, this becomes an error.
    Code(i32),
    /// Report this error through the host error channel.
    Error(String),
}

/// A datagram recorded by [`MemoryHost`] at send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub from: SocketId,
    pub to: SocketAddr,
    pub data: Bytes,
}

#[derive(Default)]
struct State {
    next_id: u32,
    sockets: HashMap<SocketId, Option<SocketAddr>>,
    bound: HashMap<SocketAddr, SocketId>,
    faults: HashMap<HostOp, VecDeque<Fault>>,
    sent: Vec<Sent>,
}

/// In-process loopback network.
///
/// Sockets bound on the same host can reach each other by address; a
/// datagram to an address nobody is bound to is dropped, like UDP. Faults
/// armed with [`fail_next`](Self::fail_next) are consumed in order, one per
/// call of the matching operation.
pub struct MemoryHost {
    state: Mutex<State>,
    events_tx: UnboundedSender<Inbound>,
    events_rx: Mutex<Option<UnboundedReceiver<Inbound>>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Arm a fault for the next call of `op`.
    pub fn fail_next(&self, op: HostOp, fault: Fault) {
        self.state().faults.entry(op).or_default().push_back(fault);
    }

    /// Deliver a raw datagram to the inbound stream as if it arrived on `socket`.
    ///
    /// The socket does not need to exist.
    pub fn inject(&self, socket: SocketId, data: impl Into<Bytes>) {
        let _ = self.events_tx.send(Inbound {
            socket,
            data: data.into(),
        });
    }

    /// Every datagram sent so far, in send order.
    pub fn sent(&self) -> Vec<Sent> {
        self.state().sent.clone()
    }

    /// The address a socket is bound to, if any.
    pub fn bound_addr(&self, id: SocketId) -> Option<SocketAddr> {
        self.state().sockets.get(&id).copied().flatten()
    }

    /// The socket bound to `addr`, if any.
    pub fn socket_at(&self, addr: SocketAddr) -> Option<SocketId> {
        self.state().bound.get(&addr).copied()
    }

    /// Number of sockets created and not yet closed.
    pub fn open_sockets(&self) -> usize {
        self.state().sockets.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn take_fault(&mut self, op: HostOp) -> Option<Fault> {
        self.faults.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn ephemeral_port(&self, ip: IpAddr) -> Option<u16> {
        (EPHEMERAL_START..=u16::MAX)
            .find(|port| !self.bound.contains_key(&SocketAddr::new(ip, *port)))
    }
}

fn fault_error(op: HostOp, fault: Fault) -> HostError {
    match fault {
        Fault::Code(code) => HostError::Rejected(format!("{op:?} failed with code {code}")),
        Fault::Error(message) => HostError::Rejected(message),
    }
}

impl DatagramHost for MemoryHost {
    async fn create(&self) -> Result<SocketId> {
        let mut state = self.state();
        if let Some(fault) = state.take_fault(HostOp::Create) {
            return Err(fault_error(HostOp::Create, fault));
        }
        let raw = state.next_id;
        state.next_id = raw.checked_add(1).ok_or(HostError::Exhausted)?;
        let id = SocketId::new(raw);
        state.sockets.insert(id, None);
        Ok(id)
    }

    async fn bind(&self, id: SocketId, ip: IpAddr, port: u16) -> Result<i32> {
        let mut state = self.state();
        match state.take_fault(HostOp::Bind) {
            Some(Fault::Code(code)) => return Ok(code),
            Some(fault) => return Err(fault_error(HostOp::Bind, fault)),
            None => {}
        }

        match state.sockets.get(&id) {
            None => return Err(HostError::UnknownSocket(id)),
            Some(Some(_)) => {
                return Err(HostError::Rejected(format!("socket {id} is already bound")))
            }
            Some(None) => {}
        }

        let port = if port == 0 {
            state
                .ephemeral_port(ip)
                .ok_or_else(|| HostError::Rejected("no ephemeral ports left".to_string()))?
        } else {
            port
        };
        let addr = SocketAddr::new(ip, port);
        if state.bound.contains_key(&addr) {
            return Err(HostError::Bind {
                id,
                addr,
                source: std::io::Error::from(ErrorKind::AddrInUse),
            });
        }

        state.bound.insert(addr, id);
        state.sockets.insert(id, Some(addr));
        Ok(0)
    }

    async fn send(&self, id: SocketId, data: Bytes, to: SocketAddr) -> Result<i32> {
        let mut state = self.state();
        match state.take_fault(HostOp::Send) {
            Some(Fault::Code(code)) => return Ok(code),
            Some(fault) => return Err(fault_error(HostOp::Send, fault)),
            None => {}
        }

        match state.sockets.get(&id) {
            None => return Err(HostError::UnknownSocket(id)),
            Some(None) => return Err(HostError::NotBound(id)),
            Some(Some(_)) => {}
        }

        state.sent.push(Sent {
            from: id,
            to,
            data: data.clone(),
        });

        let len = i32::try_from(data.len()).unwrap_or(i32::MAX);
        match state.bound.get(&to) {
            Some(&dest) => {
                let _ = self.events_tx.send(Inbound { socket: dest, data });
            }
            None => trace!(%id, %to, "no socket bound at destination; datagram dropped"),
        }
        Ok(len)
    }

    async fn close(&self, id: SocketId) -> Result<()> {
        let mut state = self.state();
        if let Some(fault) = state.take_fault(HostOp::Close) {
            return Err(fault_error(HostOp::Close, fault));
        }
        let addr = state
            .sockets
            .remove(&id)
            .ok_or(HostError::UnknownSocket(id))?;
        if let Some(addr) = addr {
            state.bound.remove(&addr);
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<UnboundedReceiver<Inbound>> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn delivers_between_bound_sockets() {
        let host = MemoryHost::new();
        let mut events = host.subscribe().unwrap();

        let a = host.create().await.unwrap();
        let b = host.create().await.unwrap();
        host.bind(a, LOCALHOST, 5000).await.unwrap();
        host.bind(b, LOCALHOST, 5001).await.unwrap();

        let to = SocketAddr::new(LOCALHOST, 5001);
        assert_eq!(host.send(a, Bytes::from_static(b"abc"), to).await.unwrap(), 3);

        let inbound = events.recv().await.unwrap();
        assert_eq!(inbound.socket, b);
        assert_eq!(inbound.data.as_ref(), b"abc");
        assert_eq!(host.sent().len(), 1);
    }

    #[tokio::test]
    async fn unbound_destination_drops_datagram() {
        let host = MemoryHost::new();
        let mut events = host.subscribe().unwrap();
        let a = host.create().await.unwrap();
        host.bind(a, LOCALHOST, 0).await.unwrap();

        host.send(a, Bytes::from_static(b"x"), SocketAddr::new(LOCALHOST, 7))
            .await
            .unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn faults_are_consumed_in_order() {
        let host = MemoryHost::new();
        host.fail_next(HostOp::Bind, Fault::Code(-2));
        host.fail_next(HostOp::Bind, Fault::Error("busy".into()));

        let id = host.create().await.unwrap();
        assert_eq!(host.bind(id, LOCALHOST, 6000).await.unwrap(), -2);
        assert!(matches!(
            host.bind(id, LOCALHOST, 6000).await,
            Err(HostError::Rejected(msg)) if msg == "busy"
        ));
        assert_eq!(host.bind(id, LOCALHOST, 6000).await.unwrap(), 0);
        assert_eq!(host.bound_addr(id), Some(SocketAddr::new(LOCALHOST, 6000)));
    }

    #[tokio::test]
    async fn address_in_use_is_a_bind_error() {
        let host = MemoryHost::new();
        let a = host.create().await.unwrap();
        let b = host.create().await.unwrap();
        host.bind(a, LOCALHOST, 6100).await.unwrap();
        let err = host.bind(b, LOCALHOST, 6100).await.unwrap_err();
        assert!(
            matches!(err, HostError::Bind { source, .. } if source.kind() == ErrorKind::AddrInUse)
        );
    }

    #[tokio::test]
    async fn close_releases_address() {
        let host = MemoryHost::new();
        let a = host.create().await.unwrap();
        host.bind(a, LOCALHOST, 6200).await.unwrap();
        host.close(a).await.unwrap();
        assert_eq!(host.open_sockets(), 0);
        assert_eq!(host.socket_at(SocketAddr::new(LOCALHOST, 6200)), None);
        assert!(matches!(host.close(a).await, Err(HostError::UnknownSocket(_))));
    }

    #[tokio::test]
    async fn inject_reaches_subscriber() {
        let host = MemoryHost::new();
        let mut events = host.subscribe().unwrap();
        host.inject(SocketId::new(99), vec![1u8, 2, 3]);
        let inbound = events.recv().await.unwrap();
        assert_eq!(inbound.socket, SocketId::new(99));
        assert_eq!(inbound.data.as_ref(), &[1, 2, 3]);
    }
}
