//! Transports the correlation client can run over.
//!
//! [`TlsConnector`] is what production uses: TCP wrapped in TLS, trusting
//! only the certificates configured for the node. [`TcpConnector`] is the
//! bare stream underneath it. [`MemoryConnector`] hands out
//! in-process duplex pipes and is what the test suite and the mock ledger
//! node use; each `connect()` yields a fresh pipe whose far end shows up on
//! the paired [`MemoryListener`].

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};

use crate::config::{ConfigError, ValidatedConfig};

/// Opens a byte stream to the ledger node.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Io: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    async fn connect(&self) -> io::Result<Self::Io>;

    /// Where this connector points, for logs.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// TCP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Io = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(&self.address).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}

// ---------------------------------------------------------------------------
// TLS
// ---------------------------------------------------------------------------

/// TCP wrapped in TLS. The node's certificate must chain to the configured
/// roots; the system trust store is never consulted.
#[derive(Clone)]
pub struct TlsConnector {
    tcp: TcpConnector,
    server_name: ServerName<'static>,
    tls: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    pub fn new(
        address: impl Into<String>,
        server_name: &str,
        config: Arc<ClientConfig>,
    ) -> Result<Self, ConfigError> {
        let server_name = ServerName::try_from(server_name)
            .map_err(|e| ConfigError::Invalid {
                field: "node_server_name",
                reason: format!("'{server_name}': {e}"),
            })?
            .to_owned();
        Ok(Self {
            tcp: TcpConnector::new(address),
            server_name,
            tls: tokio_rustls::TlsConnector::from(config),
        })
    }

    /// Trusts the certificates in the PEM file at `ca_path`, and nothing
    /// else.
    pub fn from_ca_file(
        address: impl Into<String>,
        server_name: &str,
        ca_path: &Path,
    ) -> Result<Self, ConfigError> {
        let roots = load_roots(ca_path)?;
        Self::new(address, server_name, client_config(roots)?)
    }

    /// The node connector described by `config`. Requires `node_ca_path`.
    pub fn from_config(config: &ValidatedConfig) -> Result<Self, ConfigError> {
        let ca_path = config
            .node_ca_path
            .as_deref()
            .ok_or(ConfigError::Missing("node_ca_path"))?;
        Self::from_ca_file(config.node_address.clone(), &config.node_server_name, ca_path)
    }
}

impl fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnector")
            .field("address", &self.tcp.address)
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for TlsConnector {
    type Io = TlsStream<TcpStream>;

    /// A failed handshake surfaces as an I/O error, like a refused connect.
    async fn connect(&self) -> io::Result<TlsStream<TcpStream>> {
        let stream = self.tcp.connect().await?;
        self.tls.connect(self.server_name.clone(), stream).await
    }

    fn describe(&self) -> String {
        format!("tls://{}", self.tcp.address)
    }
}

/// Client config on the ring provider, trusting exactly `roots`.
pub fn client_config(roots: RootCertStore) -> Result<Arc<ClientConfig>, ConfigError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Invalid {
            field: "node_ca_path",
            reason: e.to_string(),
        })?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

fn load_roots(path: &Path) -> Result<RootCertStore, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        field: "node_ca_path",
        reason: format!("{}: {reason}", path.display()),
    };
    let pem = std::fs::read(path).map_err(|e| invalid(e.to_string()))?;

    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        let cert = cert.map_err(|e| invalid(e.to_string()))?;
        roots.add(cert).map_err(|e| invalid(e.to_string()))?;
    }
    if roots.is_empty() {
        return Err(invalid("no certificates found".to_string()));
    }
    Ok(roots)
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

const MEMORY_PIPE_CAPACITY: usize = 64 * 1024;

/// Client side of an in-process transport.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<DuplexStream>,
}

/// Server side of an in-process transport.
#[derive(Debug)]
pub struct MemoryListener {
    accept_rx: Mutex<mpsc::UnboundedReceiver<DuplexStream>>,
}

impl MemoryConnector {
    pub fn pair() -> (MemoryConnector, MemoryListener) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (
            MemoryConnector { accept_tx },
            MemoryListener {
                accept_rx: Mutex::new(accept_rx),
            },
        )
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Io = DuplexStream;

    async fn connect(&self) -> io::Result<DuplexStream> {
        let (client, server) = tokio::io::duplex(MEMORY_PIPE_CAPACITY);
        self.accept_tx
            .send(server)
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "listener closed"))?;
        Ok(client)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

impl MemoryListener {
    /// Waits for the next connection. `None` once every connector is gone.
    pub async fn accept(&self) -> Option<DuplexStream> {
        self.accept_rx.lock().await.recv().await
    }
}
