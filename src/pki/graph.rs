//! Trust relationships between authorities.

use std::collections::{BTreeMap, BTreeSet};

use super::error::{PkiError, PkiResult};
use super::store::validate_name;

/// Authority that signs the backend leaf.
pub const BACKEND_CA: &str = "backend-ca";
/// Authority that signs the proxy client leaf.
pub const PROXY_CLIENT_CA: &str = "proxy-client-ca";

/// Maps each component to the components whose certificates it trusts.
///
/// Every name that appears in the graph, as a key or as a trusted entry, is
/// backed by its own authority. Each key gets a trust bundle holding the
/// certificates of the authorities it trusts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustGraph {
    edges: BTreeMap<String, Vec<String>>,
}

impl TrustGraph {
    pub fn new(edges: BTreeMap<String, Vec<String>>) -> PkiResult<Self> {
        if edges.is_empty() {
            return Err(PkiError::InvalidTrustGraph("graph is empty".to_string()));
        }
        for (component, trusted) in &edges {
            for name in std::iter::once(component).chain(trusted) {
                validate_name(name)
                    .map_err(|_| PkiError::InvalidTrustGraph(format!("bad component {:?}", name)))?;
            }
        }
        Ok(Self { edges })
    }

    /// The backend and proxy client authorities, each trusting the other.
    pub fn internal_ssl() -> Self {
        let edges = BTreeMap::from([
            (BACKEND_CA.to_string(), vec![PROXY_CLIENT_CA.to_string()]),
            (PROXY_CLIENT_CA.to_string(), vec![BACKEND_CA.to_string()]),
        ]);
        Self { edges }
    }

    /// Returns every distinct component, sorted.
    pub fn components(&self) -> BTreeSet<&str> {
        self.edges
            .iter()
            .flat_map(|(component, trusted)| {
                std::iter::once(component.as_str()).chain(trusted.iter().map(String::as_str))
            })
            .collect()
    }

    /// Returns the components `component` trusts, or an empty slice if it
    /// has no bundle.
    pub fn trusted_by(&self, component: &str) -> &[String] {
        self.edges
            .get(component)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterates over `(component, trusted)` pairs, one per trust bundle.
    pub fn bundles(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.edges
            .iter()
            .map(|(component, trusted)| (component.as_str(), trusted.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_ssl_graph_is_mutual() {
        let graph = TrustGraph::internal_ssl();
        assert_eq!(
            graph.components().into_iter().collect::<Vec<_>>(),
            vec![BACKEND_CA, PROXY_CLIENT_CA]
        );
        assert_eq!(graph.trusted_by(BACKEND_CA), [PROXY_CLIENT_CA.to_string()]);
        assert_eq!(graph.trusted_by(PROXY_CLIENT_CA), [BACKEND_CA.to_string()]);
        assert_eq!(graph.bundles().count(), 2);
    }

    /// Components that only appear as trusted entries still need an
    /// authority, but get no bundle of their own.
    #[test]
    fn trusted_only_components() {
        let graph = TrustGraph::new(BTreeMap::from([(
            "hub-ca".to_string(),
            vec!["hub-ca".to_string(), "notebooks-ca".to_string()],
        )]))
        .unwrap();
        assert_eq!(
            graph.components().into_iter().collect::<Vec<_>>(),
            vec!["hub-ca", "notebooks-ca"]
        );
        assert!(graph.trusted_by("notebooks-ca").is_empty());
        assert_eq!(graph.bundles().count(), 1);
    }

    #[test]
    fn invalid_graphs_rejected() {
        assert!(matches!(
            TrustGraph::new(BTreeMap::new()),
            Err(PkiError::InvalidTrustGraph(_))
        ));
        assert!(matches!(
            TrustGraph::new(BTreeMap::from([(
                "ca".to_string(),
                vec!["../escape".to_string()]
            )])),
            Err(PkiError::InvalidTrustGraph(_))
        ));
    }
}
