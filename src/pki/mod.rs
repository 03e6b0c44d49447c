//! Test PKI generation.
//!
//! Authorities are created for every component of a trust graph, each graph
//! key gets a trust bundle, and leaves are issued by their named authority.

mod authority;
mod error;
mod graph;
mod provision;
mod store;

pub use authority::{Authority, Leaf};
pub use error::{PkiError, PkiResult};
pub use graph::{BACKEND_CA, PROXY_CLIENT_CA, TrustGraph};
pub use provision::{BACKEND, LeafSpec, PROXY_CLIENT, Provisioner, internal_ssl_leaves, provision};
pub use store::{CertStore, MANIFEST_FILE, Manifest, Record, trust_bundle_file};
