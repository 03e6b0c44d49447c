//! Mutually authenticated echo server.

use std::net::SocketAddr;
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::server::WebPkiClientVerifier;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

use super::error::TlsError;
use super::material::{TlsMaterials, crypto_provider};
use crate::transcript::Transcript;

/// Upper bound on a single request read.
pub const MAX_MESSAGE_LEN: usize = 5;
/// Reply written to every request.
pub const PONG: &[u8] = b"pong";

/// TLS listener that requires a client certificate, reads one short
/// message per connection and answers `pong`.
pub struct EchoResponder {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    transcript: Arc<dyn Transcript>,
}

impl EchoResponder {
    /// Creates a server config that presents `materials`' chain and only
    /// accepts clients whose certificate chains to its trust bundle.
    pub fn server_config(materials: &TlsMaterials) -> Result<Arc<ServerConfig>, TlsError> {
        let provider = crypto_provider();
        let verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::new(materials.roots()?), provider.clone())
                .build()?;
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_client_cert_verifier(verifier)
            .with_single_cert(materials.cert_chain()?, materials.private_key()?)?;
        Ok(Arc::new(config))
    }

    /// Binds the listener.
    pub async fn bind<A>(
        addr: A,
        materials: &TlsMaterials,
        transcript: Arc<dyn Transcript>,
    ) -> Result<Self, TlsError>
    where
        A: ToSocketAddrs + std::fmt::Debug,
    {
        let acceptor = TlsAcceptor::from(Self::server_config(materials)?);
        let addr_text = format!("{:?}", addr);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TlsError::Bind {
                addr: addr_text,
                source,
            })?;
        if let Ok(local) = listener.local_addr() {
            info!("responder listening on {}", local);
        }

        Ok(Self {
            listener,
            acceptor,
            transcript,
        })
    }

    /// Returns the local address the responder is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, one task per connection.
    ///
    /// A failed handshake or exchange is logged and does not stop the
    /// listener.
    pub async fn run(self) -> Result<(), std::io::Error> {
        loop {
            let (stream, peer_addr) = self.listener.accept().await?;
            debug!("accepted connection from {}", peer_addr);

            let acceptor = self.acceptor.clone();
            let transcript = Arc::clone(&self.transcript);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, acceptor, transcript).await {
                    error!("connection error from {}: {}", peer_addr, e);
                }
            });
        }
    }

    /// Accepts and answers exactly one connection.
    /// Returns the message the client sent.
    pub async fn serve_one(&self) -> Result<String, TlsError> {
        let (stream, peer_addr) = self.listener.accept().await.map_err(TlsError::Io)?;
        debug!("accepted connection from {}", peer_addr);
        handle_connection(
            stream,
            peer_addr,
            self.acceptor.clone(),
            Arc::clone(&self.transcript),
        )
        .await
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    acceptor: TlsAcceptor,
    transcript: Arc<dyn Transcript>,
) -> Result<String, TlsError> {
    let mut tls_stream = acceptor.accept(stream).await.map_err(TlsError::Handshake)?;
    transcript.line("client connected");
    debug!("TLS handshake completed with {}", peer_addr);

    let mut buf = [0u8; MAX_MESSAGE_LEN];
    let n = tls_stream.read(&mut buf).await.map_err(TlsError::Io)?;
    let msg = String::from_utf8_lossy(&buf[..n]).into_owned();
    transcript.line(&format!("server received {}", msg));

    tls_stream.write_all(PONG).await.map_err(TlsError::Io)?;
    tls_stream.flush().await.map_err(TlsError::Io)?;
    // The reply is already out; a peer that hangs up first is not a failure.
    if let Err(e) = tls_stream.shutdown().await {
        debug!("shutdown with {} failed: {}", peer_addr, e);
    }

    Ok(msg)
}
