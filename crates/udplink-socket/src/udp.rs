use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{HostError, Result};
use crate::traits::{DatagramHost, Inbound, SocketId};

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

#[derive(Default)]
struct Slot {
    socket: Option<Arc<UdpSocket>>,
    reader: Option<JoinHandle<()>>,
}

/// Datagram host over real tokio UDP sockets.
///
/// Every bound socket gets a reader task that forwards received datagrams
/// to the shared inbound stream. Closing a socket aborts its reader, so no
/// datagram for a closed socket is delivered afterwards.
///
/// Must be used from within a tokio runtime.
pub struct UdpHost {
    slots: Mutex<HashMap<SocketId, Slot>>,
    next_id: AtomicU32,
    events_tx: UnboundedSender<Inbound>,
    events_rx: Mutex<Option<UnboundedReceiver<Inbound>>>,
}

impl UdpHost {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// The local address a socket is bound to.
    pub fn local_addr(&self, id: SocketId) -> Result<SocketAddr> {
        let socket = self.bound_socket(id)?;
        Ok(socket.local_addr()?)
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<SocketId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bound_socket(&self, id: SocketId) -> Result<Arc<UdpSocket>> {
        let slots = self.slots();
        let slot = slots.get(&id).ok_or(HostError::UnknownSocket(id))?;
        slot.socket.clone().ok_or(HostError::NotBound(id))
    }
}

impl Default for UdpHost {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramHost for UdpHost {
    async fn create(&self) -> Result<SocketId> {
        let raw = self
            .next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map_err(|_| HostError::Exhausted)?;
        let id = SocketId::new(raw);
        self.slots().insert(id, Slot::default());
        debug!(%id, "socket created");
        Ok(id)
    }

    async fn bind(&self, id: SocketId, ip: IpAddr, port: u16) -> Result<i32> {
        {
            let slots = self.slots();
            let slot = slots.get(&id).ok_or(HostError::UnknownSocket(id))?;
            if slot.socket.is_some() {
                return Err(HostError::Rejected(format!("socket {id} is already bound")));
            }
        }

        let addr = SocketAddr::new(ip, port);
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| HostError::Bind { id, addr, source })?;
        let socket = Arc::new(socket);

        let mut slots = self.slots();
        // The socket may have been closed while the bind was in flight.
        let slot = slots.get_mut(&id).ok_or(HostError::UnknownSocket(id))?;
        // A concurrent bind on the same id may have won the race.
        if slot.socket.is_some() {
            return Err(HostError::Rejected(format!("socket {id} is already bound")));
        }
        slot.reader = Some(spawn_reader(id, socket.clone(), self.events_tx.clone()));
        slot.socket = Some(socket);

        info!(%id, %addr, "bound udp socket");
        Ok(0)
    }

    async fn send(&self, id: SocketId, data: Bytes, to: SocketAddr) -> Result<i32> {
        let socket = self.bound_socket(id)?;
        let sent = socket
            .send_to(&data, to)
            .await
            .map_err(|source| HostError::Send {
                id,
                addr: to,
                source,
            })?;
        debug!(%id, %to, sent, "datagram sent");
        Ok(i32::try_from(sent).unwrap_or(i32::MAX))
    }

    async fn close(&self, id: SocketId) -> Result<()> {
        let slot = self.slots().remove(&id).ok_or(HostError::UnknownSocket(id))?;
        if let Some(reader) = slot.reader {
            reader.abort();
        }
        debug!(%id, "socket closed");
        Ok(())
    }

    fn subscribe(&self) -> Option<UnboundedReceiver<Inbound>> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for UdpHost {
    fn drop(&mut self) {
        for slot in self.slots().values_mut() {
            if let Some(reader) = slot.reader.take() {
                reader.abort();
            }
        }
    }
}

fn spawn_reader(
    id: SocketId,
    socket: Arc<UdpSocket>,
    events: UnboundedSender<Inbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, from)) => {
                    debug!(%id, %from, len, "datagram received");
                    let inbound = Inbound {
                        socket: id,
                        data: Bytes::copy_from_slice(&buf[..len]),
                    };
                    if events.send(inbound).is_err() {
                        break;
                    }
                }
                // ICMP port-unreachable from an earlier send surfaces here on some platforms.
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
                    ) =>
                {
                    continue
                }
                Err(err) => {
                    warn!(%id, error = %err, "socket reader stopped");
                    break;
                }
            }
        }
    })
}
