use std::path::PathBuf;

use rustls::pki_types::pem;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("no leaf named {0} in store")]
    UnknownRole(String),
    #[error("authority {0} has no trust bundle")]
    MissingTrustBundle(String),
    #[error("failed to read PEM from {path:?}: {source}")]
    Pem {
        path: PathBuf,
        #[source]
        source: pem::Error,
    },
    #[error("no certificates in {0:?}")]
    EmptyCertificates(PathBuf),
    #[error("no trust anchors in {0:?}")]
    EmptyTrustBundle(PathBuf),
    #[error("invalid trust anchor in {path:?}: {source}")]
    TrustAnchor {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },
    #[error("invalid TLS configuration: {0}")]
    Config(#[from] rustls::Error),
    #[error("failed to build client verifier: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),
    #[error("invalid server name: {0}")]
    InvalidServerName(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
    #[error("peer closed the connection without replying")]
    EmptyReply,
}
