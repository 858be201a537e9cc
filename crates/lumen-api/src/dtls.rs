// Entertainment datagram transport: PSK-DTLS over UDP.
//
// The session layer in `lumen-core` only sees the `DatagramConnector` /
// `DatagramSink` traits, so it can be driven by an in-memory sink in
// tests. `DtlsConnector` is the real implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webrtc_dtls::cipher_suite::CipherSuiteId;
use webrtc_dtls::config::Config;
use webrtc_dtls::conn::DTLSConn;
use webrtc_util::conn::Conn;

use crate::error::Error;

/// UDP port the bridge listens on for entertainment streams.
pub const ENTERTAINMENT_PORT: u16 = 2100;

/// Everything needed to open a stream to one bridge.
#[derive(Debug, Clone)]
pub struct StreamCredentials {
    pub host: String,
    pub port: u16,
    /// PSK identity: the application key.
    pub identity: String,
    /// Hex-encoded PSK: the client key issued at pairing.
    pub client_key: SecretString,
}

impl StreamCredentials {
    pub fn new(host: impl Into<String>, identity: impl Into<String>, client_key: SecretString) -> Self {
        Self {
            host: host.into(),
            port: ENTERTAINMENT_PORT,
            identity: identity.into(),
            client_key,
        }
    }
}

/// Decode the hex client key into raw PSK bytes.
pub fn psk_from_hex(client_key: &SecretString) -> Result<Vec<u8>, Error> {
    hex::decode(client_key.expose_secret()).map_err(|e| Error::InvalidClientKey(e.to_string()))
}

/// An open, connected datagram channel.
///
/// `send` is fire-and-forget from the caller's point of view: there is no
/// acknowledgement and no backpressure beyond the socket buffer.
#[async_trait]
pub trait DatagramSink: Send + Sync {
    async fn send(&self, datagram: &[u8]) -> Result<(), Error>;

    async fn close(&self) -> Result<(), Error>;

    /// Cancelled once the transport is closed, locally or by the peer.
    fn closed(&self) -> CancellationToken;
}

/// Opens [`DatagramSink`]s.
#[async_trait]
pub trait DatagramConnector: Send + Sync {
    async fn connect(&self, credentials: &StreamCredentials) -> Result<Arc<dyn DatagramSink>, Error>;
}

// ── DTLS implementation ──────────────────────────────────────────────

/// PSK-DTLS 1.2 client with `TLS_PSK_WITH_AES_128_GCM_SHA256` only.
#[derive(Debug, Clone)]
pub struct DtlsConnector {
    pub handshake_timeout: Duration,
}

impl Default for DtlsConnector {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl DatagramConnector for DtlsConnector {
    async fn connect(&self, credentials: &StreamCredentials) -> Result<Arc<dyn DatagramSink>, Error> {
        let psk = psk_from_hex(&credentials.client_key)?;

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| Error::Dtls(format!("bind failed: {e}")))?;
        socket
            .connect((credentials.host.as_str(), credentials.port))
            .await
            .map_err(|e| Error::Dtls(format!("connect to {}:{} failed: {e}", credentials.host, credentials.port)))?;

        let config = Config {
            psk: Some(Arc::new(move |_hint: &[u8]| {
                Ok::<_, webrtc_dtls::Error>(psk.clone())
            })),
            psk_identity_hint: Some(credentials.identity.as_bytes().to_vec()),
            cipher_suites: vec![CipherSuiteId::Tls_Psk_With_Aes_128_Gcm_Sha256],
            ..Default::default()
        };

        info!(host = %credentials.host, port = credentials.port, "DTLS handshake");
        let handshake = DTLSConn::new(Arc::new(socket), config, true, None);
        let conn = tokio::time::timeout(self.handshake_timeout, handshake)
            .await
            .map_err(|_| Error::Dtls("handshake timed out".into()))?
            .map_err(|e| Error::Dtls(format!("handshake failed: {e}")))?;

        let sink = DtlsSink {
            conn: Arc::new(conn),
            closed: CancellationToken::new(),
        };
        sink.spawn_watcher();
        Ok(Arc::new(sink))
    }
}

struct DtlsSink {
    conn: Arc<DTLSConn>,
    closed: CancellationToken,
}

impl DtlsSink {
    /// Read until the peer goes away; the bridge never sends payloads,
    /// so any receive error means the session is over.
    fn spawn_watcher(&self) {
        let conn = Arc::clone(&self.conn);
        let closed = self.closed.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            loop {
                tokio::select! {
                    biased;
                    () = closed.cancelled() => break,
                    result = conn.recv(&mut buf) => {
                        match result {
                            Ok(n) => debug!(len = n, "unexpected datagram from bridge"),
                            Err(e) => {
                                warn!(error = %e, "DTLS connection closed");
                                closed.cancel();
                                break;
                            }
                        }
                    }
                }
            }
        });
    }
}

#[async_trait]
impl DatagramSink for DtlsSink {
    async fn send(&self, datagram: &[u8]) -> Result<(), Error> {
        if self.closed.is_cancelled() {
            return Err(Error::Dtls("connection closed".into()));
        }
        self.conn
            .send(datagram)
            .await
            .map(|_| ())
            .map_err(|e| Error::Dtls(e.to_string()))
    }

    async fn close(&self) -> Result<(), Error> {
        self.closed.cancel();
        self.conn.close().await.map_err(|e| Error::Dtls(e.to_string()))
    }

    fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn psk_decodes_hex_client_key() {
        let key = SecretString::from("0a0B10ff");
        assert_eq!(psk_from_hex(&key).unwrap(), vec![0x0a, 0x0b, 0x10, 0xff]);
    }

    #[test]
    fn psk_rejects_non_hex() {
        let key = SecretString::from("not-hex");
        assert!(matches!(psk_from_hex(&key), Err(Error::InvalidClientKey(_))));
    }

    #[test]
    fn credentials_default_to_entertainment_port() {
        let creds = StreamCredentials::new("10.0.0.2", "app", SecretString::from("00"));
        assert_eq!(creds.port, 2100);
    }
}
