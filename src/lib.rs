//! Test fixtures for an internal mutual TLS transport.
//!
//! This crate regenerates a small PKI used by test suites and checks that it
//! works end to end:
//!
//! 1. The store directory is wiped and recreated.
//! 2. Two authorities, `backend-ca` and `proxy-client-ca`, are generated.
//!    Each trusts certificates issued by the other, recorded as one trust
//!    bundle per authority.
//! 3. One leaf per role (`backend`, `proxy-client`) is issued for the
//!    loopback identities `127.0.0.1`, `::1` and `localhost`.
//! 4. A responder holding the backend leaf listens on loopback and requires a
//!    client certificate. A probe holding the proxy client leaf connects,
//!    sends `ping` and expects `pong`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use internal_ssl::{FixtureConfig, Steps, Stdout};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = FixtureConfig::default();
//! internal_ssl::smoke::run(&config, Steps::All, Arc::new(Stdout)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod pki;
pub mod smoke;
pub mod tls;
mod transcript;

pub use config::{AltName, ConfigError, FixtureConfig};
pub use pki::{CertStore, PkiError, TrustGraph, provision};
pub use smoke::{SmokeReport, Steps};
pub use tls::{EchoResponder, Probe, TlsError, TlsMaterials};
pub use transcript::{Recorded, Stdout, Transcript};
