//! Client side of the ping/pong check.

use std::path::Path;
use std::sync::Arc;

use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_rustls::TlsConnector;
use tracing::debug;

use super::error::TlsError;
use super::material::{TlsMaterials, crypto_provider, load_roots};
use super::responder::MAX_MESSAGE_LEN;

/// Request written after the handshake.
pub const PING: &[u8] = b"ping";

/// TLS client that verifies the server's name and chain, optionally
/// presenting its own certificate.
pub struct Probe {
    connector: TlsConnector,
}

impl Probe {
    /// Creates a probe that authenticates with `materials`' chain and key.
    pub fn new(materials: &TlsMaterials) -> Result<Self, TlsError> {
        let config = ClientConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(materials.roots()?)
            .with_client_auth_cert(materials.cert_chain()?, materials.private_key()?)?;
        Ok(Self::from_config(config))
    }

    /// Creates a probe that presents no client certificate.
    pub fn anonymous(trust_bundle: &Path) -> Result<Self, TlsError> {
        let config = ClientConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(load_roots(trust_bundle)?)
            .with_no_client_auth();
        Ok(Self::from_config(config))
    }

    fn from_config(config: ClientConfig) -> Self {
        Self {
            connector: TlsConnector::from(Arc::new(config)),
        }
    }

    /// Connects to `host:port`, verifying the server as `host`.
    pub async fn ping(&self, host: &str, port: u16) -> Result<String, TlsError> {
        self.ping_at((host, port), host).await
    }

    /// Connects to `addr`, verifying the server as `server_name`, sends
    /// `ping` and returns the reply.
    pub async fn ping_at<A>(&self, addr: A, server_name: &str) -> Result<String, TlsError>
    where
        A: ToSocketAddrs + std::fmt::Debug,
    {
        let server_name = ServerName::try_from(server_name.to_string())
            .map_err(|_| TlsError::InvalidServerName(server_name.to_string()))?;

        let addr_text = format!("{:?}", addr);
        let tcp_stream = TcpStream::connect(addr)
            .await
            .map_err(|source| TlsError::Connect {
                addr: addr_text,
                source,
            })?;

        let mut tls_stream = self
            .connector
            .connect(server_name, tcp_stream)
            .await
            .map_err(TlsError::Handshake)?;
        debug!("TLS connection established");

        tls_stream.write_all(PING).await.map_err(TlsError::Io)?;
        tls_stream.flush().await.map_err(TlsError::Io)?;

        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let n = tls_stream.read(&mut buf).await.map_err(TlsError::Io)?;
        if n == 0 {
            return Err(TlsError::EmptyReply);
        }
        Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
    }
}
