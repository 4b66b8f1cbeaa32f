//! Session-oriented datagram transport.
//!
//! This is the "just works" layer. Open a session to a numbered device,
//! send and receive framed datagrams on it, and close it again. Inbound
//! datagrams for many concurrently open sessions are demultiplexed here:
//! each is either handed straight to a waiting receiver or buffered in
//! arrival order until one shows up.

pub mod completion;
pub mod config;
pub mod device;
pub mod error;
pub mod mux;
pub mod registry;
pub mod transport;

pub use completion::{completion, Canceled, Completer, Completion};
pub use config::{DisconnectPolicy, TransportConfig, DEFAULT_ADDRESS};
pub use device::{parse_device, parse_session, Device};
pub use error::{ErrorKind, Result, SessionError};
pub use mux::{Arrival, Purged, ReceiveMux};
pub use registry::{PeerInfo, SessionId, SocketRegistry};
pub use transport::Transport;
