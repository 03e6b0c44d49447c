//! Mutual TLS ping/pong over loopback.
//!
//! The responder plays the backend and the probe plays the proxy client.
//! Both sides present a leaf from the store and verify the peer against
//! their issuer's trust bundle.

mod error;
mod material;
mod probe;
mod responder;

pub use error::TlsError;
pub use material::{TlsMaterials, load_roots};
pub use probe::{PING, Probe};
pub use responder::{EchoResponder, MAX_MESSAGE_LEN, PONG};
