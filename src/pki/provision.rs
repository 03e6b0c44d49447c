//! Full regeneration of the internal ssl store.

use std::collections::BTreeMap;

use time::Duration;
use tracing::info;

use super::authority::Authority;
use super::error::{PkiError, PkiResult};
use super::graph::{BACKEND_CA, PROXY_CLIENT_CA, TrustGraph};
use super::store::CertStore;
use crate::config::{AltName, FixtureConfig};

/// Leaf presented by the backend server.
pub const BACKEND: &str = "backend";
/// Leaf presented by the proxy when it connects to a backend.
pub const PROXY_CLIENT: &str = "proxy-client";

/// A leaf to issue and the authority that signs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSpec {
    pub name: String,
    pub issuer: String,
}

impl LeafSpec {
    pub fn new(name: &str, issuer: &str) -> Self {
        Self {
            name: name.to_string(),
            issuer: issuer.to_string(),
        }
    }
}

/// One leaf per role, each signed by its own authority.
pub fn internal_ssl_leaves() -> Vec<LeafSpec> {
    vec![
        LeafSpec::new(BACKEND, BACKEND_CA),
        LeafSpec::new(PROXY_CLIENT, PROXY_CLIENT_CA),
    ]
}

/// Wipes `config.ssl_dir` and regenerates the backend/proxy-client PKI.
pub fn provision(config: &FixtureConfig) -> PkiResult<CertStore> {
    let alt_names = config.parsed_alt_names()?;
    let validity = Duration::days(i64::from(config.validity_days));
    Provisioner {
        graph: TrustGraph::internal_ssl(),
        leaves: internal_ssl_leaves(),
        alt_names,
        validity,
    }
    .run(CertStore::recreate(&config.ssl_dir)?)
}

/// Issues every authority in a trust graph, their bundles and a set of
/// leaves into a freshly recreated store.
#[derive(Debug, Clone)]
pub struct Provisioner {
    pub graph: TrustGraph,
    pub leaves: Vec<LeafSpec>,
    pub alt_names: Vec<AltName>,
    pub validity: Duration,
}

impl Provisioner {
    pub fn run(&self, mut store: CertStore) -> PkiResult<CertStore> {
        let mut authorities = BTreeMap::new();
        for component in self.graph.components() {
            let ca = Authority::generate(component, self.validity)?;
            store.add_authority(&ca)?;
            authorities.insert(component, ca);
        }

        for (component, trusted) in self.graph.bundles() {
            store.write_trust_bundle(component, trusted)?;
        }

        for entry in &self.leaves {
            let ca = authorities
                .get(entry.issuer.as_str())
                .ok_or_else(|| PkiError::UnknownAuthority(entry.issuer.clone()))?;
            let leaf = ca.issue_leaf(&entry.name, &self.alt_names, self.validity)?;
            store.add_leaf(&leaf)?;
        }

        info!(
            "provisioned {} authorities and {} leaves in {}",
            authorities.len(),
            self.leaves.len(),
            store.dir().display()
        );

        Ok(store)
    }
}
