//! Loading certificates, keys and trust bundles from a store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::RootCertStore;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::{self, PemObject};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::debug;

use super::error::TlsError;
use crate::pki::CertStore;

/// The provider every config in this crate is built with.
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Files one side of a handshake needs: its own chain and key, plus the
/// bundle it verifies the peer against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterials {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub trust_bundle: PathBuf,
}

impl TlsMaterials {
    /// Resolves the materials for the leaf named `role`.
    ///
    /// The trust bundle is the one belonging to the leaf's issuing
    /// authority: a backend verifies peers with `backend-ca_trust.crt`.
    pub fn for_role(store: &CertStore, role: &str) -> Result<Self, TlsError> {
        let manifest = store.manifest();
        let record = manifest
            .get(role)
            .filter(|r| !r.is_authority())
            .ok_or_else(|| TlsError::UnknownRole(role.to_string()))?;
        let issuer = record
            .issuer
            .as_deref()
            .ok_or_else(|| TlsError::UnknownRole(role.to_string()))?;
        let trust_bundle = manifest
            .get(issuer)
            .and_then(|ca| ca.trust_bundle.as_deref())
            .ok_or_else(|| TlsError::MissingTrustBundle(issuer.to_string()))?;

        Ok(Self {
            cert: store.resolve(&record.cert),
            key: store.resolve(&record.key),
            trust_bundle: store.resolve(trust_bundle),
        })
    }

    /// Reads the certificate chain, leaf first.
    pub fn cert_chain(&self) -> Result<Vec<CertificateDer<'static>>, TlsError> {
        let chain = read_certs(&self.cert)?;
        if chain.is_empty() {
            return Err(TlsError::EmptyCertificates(self.cert.clone()));
        }
        Ok(chain)
    }

    pub fn private_key(&self) -> Result<PrivateKeyDer<'static>, TlsError> {
        PrivateKeyDer::from_pem_file(&self.key).map_err(|source| TlsError::Pem {
            path: self.key.clone(),
            source,
        })
    }

    pub fn roots(&self) -> Result<RootCertStore, TlsError> {
        load_roots(&self.trust_bundle)
    }
}

/// Builds a root store from every certificate in a PEM bundle.
pub fn load_roots(path: &Path) -> Result<RootCertStore, TlsError> {
    let mut roots = RootCertStore::empty();
    for cert in read_certs(path)? {
        roots
            .add(cert)
            .map_err(|source| TlsError::TrustAnchor {
                path: path.to_path_buf(),
                source,
            })?;
    }
    if roots.is_empty() {
        return Err(TlsError::EmptyTrustBundle(path.to_path_buf()));
    }
    debug!("loaded {} trust anchors from {}", roots.len(), path.display());
    Ok(roots)
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let pem_err = |source: pem::Error| TlsError::Pem {
        path: path.to_path_buf(),
        source,
    };
    CertificateDer::pem_file_iter(path)
        .map_err(pem_err)?
        .map(|cert| cert.map_err(pem_err))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixtureConfig;
    use crate::pki::{BACKEND, BACKEND_CA, PROXY_CLIENT, provision};
    use std::fs;

    fn provisioned() -> (tempfile::TempDir, CertStore) {
        let tmp = tempfile::tempdir().unwrap();
        let config = FixtureConfig {
            ssl_dir: tmp.path().to_path_buf(),
            ..FixtureConfig::default()
        };
        let store = provision(&config).unwrap();
        (tmp, store)
    }

    /// Tests that roles resolve to their own pair and their issuer's bundle.
    #[test]
    fn materials_for_roles() {
        let (tmp, store) = provisioned();

        let backend = TlsMaterials::for_role(&store, BACKEND).unwrap();
        assert_eq!(backend.cert, tmp.path().join("backend/backend.crt"));
        assert_eq!(backend.key, tmp.path().join("backend/backend.key"));
        assert_eq!(backend.trust_bundle, tmp.path().join("backend-ca_trust.crt"));

        let proxy = TlsMaterials::for_role(&store, PROXY_CLIENT).unwrap();
        assert_eq!(
            proxy.trust_bundle,
            tmp.path().join("proxy-client-ca_trust.crt")
        );

        assert_eq!(proxy.cert_chain().unwrap().len(), 1);
        assert!(proxy.private_key().is_ok());
        assert_eq!(proxy.roots().unwrap().len(), 1);
    }

    /// Authorities are not roles: they never sit in a handshake directly.
    #[test]
    fn unknown_roles_rejected() {
        let (_tmp, store) = provisioned();
        assert!(matches!(
            TlsMaterials::for_role(&store, "nobody"),
            Err(TlsError::UnknownRole(_))
        ));
        assert!(matches!(
            TlsMaterials::for_role(&store, BACKEND_CA),
            Err(TlsError::UnknownRole(_))
        ));
    }

    #[test]
    fn empty_files_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty.crt");
        fs::write(&empty, "").unwrap();

        assert!(matches!(
            load_roots(&empty),
            Err(TlsError::EmptyTrustBundle(_))
        ));
        let materials = TlsMaterials {
            cert: empty.clone(),
            key: empty.clone(),
            trust_bundle: empty,
        };
        assert!(matches!(
            materials.cert_chain(),
            Err(TlsError::EmptyCertificates(_))
        ));
        assert!(materials.private_key().is_err());
    }
}
