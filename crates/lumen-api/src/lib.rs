// lumen-api: Async Rust client for the lighting bridge protocols
//
// Three surfaces: the CLIP v2 REST API (`clip`), the push event stream
// (`eventstream`), and the entertainment datagram transport (`dtls`).
// Nothing in this crate holds domain state -- `lumen-core` owns that.

pub mod auth;
pub mod clip;
pub mod dtls;
pub mod error;
pub mod eventstream;
pub mod pairing;
pub mod transport;

pub use auth::{AppCredentials, APPLICATION_KEY_HEADER};
pub use clip::{ClipClient, ResourceRef};
pub use dtls::{
    DatagramConnector, DatagramSink, DtlsConnector, ENTERTAINMENT_PORT, StreamCredentials,
};
pub use error::Error;
pub use eventstream::{
    EventContainer, EventEnvelope, EventKind, EventStreamHandle, ReconnectConfig, SseBuffer,
    StreamMessage,
};
pub use pairing::{PairingOptions, PairingRequest, register_app};
pub use transport::{TlsMode, TransportConfig};
