use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use udplink_frame::{decode_datagram, encode_datagram};
use udplink_socket::{DatagramHost, Inbound};

use crate::completion::{Canceled, Completion};
use crate::config::{check_port_count, DisconnectPolicy, TransportConfig};
use crate::device::{parse_device, parse_session, Device};
use crate::error::{Result, SessionError};
use crate::mux::{Arrival, ReceiveMux};
use crate::registry::{PeerInfo, SessionId, SocketRegistry};

#[derive(Debug, Default)]
struct State {
    registry: SocketRegistry,
    mux: ReceiveMux,
    ports: Vec<u16>,
}

/// Session transport over a datagram host.
///
/// Owns the session registry and the receive multiplexer. Every operation
/// takes identifiers as strings and validates them itself, so callers can
/// pass through whatever they were handed.
///
/// The device and path arguments of `send`, `receive` and `disconnect` are
/// accepted for interface symmetry; sessions are addressed by id alone.
pub struct Transport<H> {
    host: H,
    port_diff: u16,
    address: Ipv4Addr,
    on_disconnect: DisconnectPolicy,
    state: Mutex<State>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<H: DatagramHost> Transport<H> {
    /// Create a transport without an inbound pump.
    ///
    /// Inbound datagrams must be fed through [`dispatch`](Self::dispatch).
    /// Use [`start`](Self::start) to have the host's event stream pumped
    /// automatically.
    pub fn new(host: H, config: TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            host,
            port_diff: config.port_diff,
            address: config.address,
            on_disconnect: config.on_disconnect,
            state: Mutex::new(State {
                ports: config.ports,
                ..State::default()
            }),
            pump: Mutex::new(None),
        })
    }

    /// Create a transport and spawn a task feeding it the host's inbound
    /// datagrams in delivery order.
    ///
    /// Must be called from within a tokio runtime. The task stops once the
    /// transport is dropped.
    pub fn start(host: H, config: TransportConfig) -> Result<Arc<Self>> {
        let events = host.subscribe().ok_or(SessionError::ListenerTaken)?;
        let transport = Arc::new(Self::new(host, config)?);
        let handle = tokio::spawn(pump(Arc::downgrade(&transport), events));
        *transport.pump.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(transport)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn port_diff(&self) -> u16 {
        self.port_diff
    }

    /// Replace the enumerated device ports.
    pub fn set_ports(&self, ports: Vec<u16>) -> Result<()> {
        check_port_count(ports.len(), self.port_diff)?;
        self.state().ports = ports;
        Ok(())
    }

    /// List the configured devices.
    pub fn enumerate(&self) -> Vec<Device> {
        self.state()
            .ports
            .iter()
            .copied()
            .map(Device::from_port)
            .collect()
    }

    /// Open a session to a device.
    ///
    /// Binds a new host socket to `device + port_diff` on the configured
    /// address and returns the session id.
    pub async fn connect(&self, device: &str) -> Result<String> {
        let device = parse_device(device)?;
        let local_port =
            device
                .checked_add(self.port_diff)
                .ok_or(SessionError::PortOutOfRange {
                    device,
                    port_diff: self.port_diff,
                })?;

        let id = self.host.create().await?;
        let bound = self
            .host
            .bind(id, IpAddr::V4(self.address), local_port)
            .await;
        match bound {
            Ok(code) if code >= 0 => {}
            Ok(code) => {
                self.discard_socket(id).await;
                return Err(SessionError::ResultCode {
                    op: "create socket",
                    code,
                });
            }
            Err(err) => {
                self.discard_socket(id).await;
                return Err(err.into());
            }
        }

        let peer = PeerInfo::new(IpAddr::V4(self.address), device);
        self.state().registry.register(id, peer);
        info!(session = %id, device, local_port, "session connected");
        Ok(id.to_string())
    }

    /// Frame `data` and send it to the session's peer.
    pub async fn send(&self, _device: &str, session: &str, data: &[u8]) -> Result<()> {
        let id = parse_session(session)?;
        let peer = self
            .state()
            .registry
            .lookup(id)
            .copied()
            .ok_or(SessionError::UnknownSession(id))?;

        let to = peer.socket_addr();
        let code = self.host.send(id, encode_datagram(data), to).await?;
        if code < 0 {
            return Err(SessionError::ResultCode { op: "send", code });
        }
        debug!(session = %id, %to, len = data.len(), "datagram sent");
        Ok(())
    }

    /// Receive the next payload on a session.
    ///
    /// The receive is claimed when this is called, not when the returned
    /// future is first polled: a second call while the first is still
    /// waiting fails straight away. Dropping the returned future gives the
    /// claim up.
    ///
    /// Under [`DisconnectPolicy::Purge`] a session with no registry entry and
    /// nothing buffered is rejected as unknown. Under
    /// [`DisconnectPolicy::Preserve`] any id may be waited on, and the next
    /// datagram routed to it resolves the receive.
    pub fn receive(
        &self,
        _device: &str,
        session: &str,
    ) -> impl Future<Output = Result<Bytes>> + Send + 'static {
        let claimed = parse_session(session).and_then(|id| Ok((id, self.claim_next(id)?)));
        async move {
            let (id, next) = claimed?;
            let datagram = next
                .await
                .map_err(|Canceled| SessionError::Disconnected(id))?;
            Ok(decode_datagram(datagram)?)
        }
    }

    /// Close a session.
    pub async fn disconnect(&self, _path: &str, session: &str) -> Result<()> {
        let id = parse_session(session)?;
        self.host.close(id).await?;

        let mut state = self.state();
        state.registry.remove(id);
        if self.on_disconnect == DisconnectPolicy::Purge {
            let purged = state.mux.purge(id);
            if purged.dropped > 0 || purged.waiter {
                debug!(
                    session = %id,
                    dropped = purged.dropped,
                    canceled_receive = purged.waiter,
                    "purged receive state"
                );
            }
        }
        drop(state);

        info!(session = %id, "session disconnected");
        Ok(())
    }

    /// Route one inbound datagram.
    pub fn dispatch(&self, inbound: Inbound) -> Arrival {
        let Inbound { socket, data } = inbound;
        let len = data.len();

        let mut state = self.state();
        let known = state.registry.contains(socket);
        let arrival = state.mux.on_arrival(socket, data, known);
        drop(state);

        match arrival {
            Arrival::Discarded => trace!(session = %socket, len, "dropped datagram for unknown session"),
            _ => debug!(session = %socket, len, ?arrival, "datagram arrived"),
        }
        arrival
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.state().registry.len()
    }

    pub fn is_connected(&self, session: SessionId) -> bool {
        self.state().registry.contains(session)
    }

    /// Number of datagrams buffered for a session.
    pub fn buffered(&self, session: SessionId) -> usize {
        self.state().mux.buffered_len(session)
    }

    fn claim_next(&self, id: SessionId) -> Result<Completion<Bytes>> {
        let mut state = self.state();
        if self.on_disconnect == DisconnectPolicy::Purge
            && !state.mux.has_buffered(id)
            && !state.registry.contains(id)
        {
            return Err(SessionError::UnknownSession(id));
        }
        state.mux.await_next(id)
    }

    async fn discard_socket(&self, id: SessionId) {
        if let Err(err) = self.host.close(id).await {
            warn!(session = %id, error = %err, "failed to close half-open socket");
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H> Drop for Transport<H> {
    fn drop(&mut self) {
        let pump = self.pump.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = pump.take() {
            handle.abort();
        }
    }
}

async fn pump<H: DatagramHost>(
    transport: Weak<Transport<H>>,
    mut events: UnboundedReceiver<Inbound>,
) {
    while let Some(inbound) = events.recv().await {
        let Some(transport) = transport.upgrade() else {
            break;
        };
        transport.dispatch(inbound);
    }
    debug!("inbound pump stopped");
}
