//! On-disk certificate store.
//!
//! Layout, relative to the store directory:
//!
//! ```text
//! store.yaml                 manifest of every record
//! <component>_trust.crt      trust bundle per graph component
//! <name>/<name>.crt          certificate, PEM
//! <name>/<name>.key          private key, PKCS#8 PEM
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::authority::{Authority, Leaf};
use super::error::{PkiError, PkiResult};

/// Name of the manifest file inside the store directory.
pub const MANIFEST_FILE: &str = "store.yaml";

/// Returns the file name of the trust bundle for `component`.
pub fn trust_bundle_file(component: &str) -> String {
    format!("{}_trust.crt", component)
}

/// Record names become directory and file names.
pub(crate) fn validate_name(name: &str) -> PkiResult<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(PkiError::InvalidName(name.to_string()))
    }
}

/// A certificate/key pair tracked by the store.
///
/// Paths are relative to the store directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub cert: PathBuf,
    pub key: PathBuf,
    /// Signing authority; `None` for self-signed authorities.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Trust bundle written for this authority, if it is a graph key.
    #[serde(default)]
    pub trust_bundle: Option<PathBuf>,
    /// Names of the leaves this authority signed.
    #[serde(default)]
    pub signees: Vec<String>,
}

impl Record {
    pub fn is_authority(&self) -> bool {
        self.issuer.is_none()
    }
}

/// Index of everything written to a store, keyed by record name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub records: BTreeMap<String, Record>,
}

impl Manifest {
    pub fn get(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }
}

/// A certificate store rooted at a directory.
#[derive(Debug)]
pub struct CertStore {
    dir: PathBuf,
    manifest: Manifest,
}

impl CertStore {
    /// Deletes `dir` and everything in it, then creates it empty.
    ///
    /// A missing directory is not an error.
    pub fn recreate(dir: impl Into<PathBuf>) -> PkiResult<Self> {
        let dir = dir.into();
        match fs::remove_dir_all(&dir) {
            Ok(()) => info!("removed previous store at {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(PkiError::io(&dir)(e)),
        }
        fs::create_dir_all(&dir).map_err(PkiError::io(&dir))?;

        let store = Self {
            dir,
            manifest: Manifest::default(),
        };
        store.save_manifest()?;
        Ok(store)
    }

    /// Opens an existing store by reading its manifest.
    pub fn open(dir: impl Into<PathBuf>) -> PkiResult<Self> {
        let dir = dir.into();
        let manifest = Self::load_manifest(&dir)?;
        Ok(Self { dir, manifest })
    }

    /// Reads the manifest of the store at `dir`.
    pub fn load_manifest(dir: &Path) -> PkiResult<Manifest> {
        let path = dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).map_err(PkiError::io(&path))?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Resolves a path recorded in the manifest against the store directory.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.dir.join(relative)
    }

    /// Writes an authority's certificate and key and records it.
    pub fn add_authority(&mut self, ca: &Authority) -> PkiResult<&Record> {
        let record = self.write_pair(ca.name(), ca.cert_pem(), &ca.key_pem(), None)?;
        self.insert(ca.name(), record)
    }

    /// Writes a leaf's certificate and key and records it under its issuer.
    pub fn add_leaf(&mut self, leaf: &Leaf) -> PkiResult<&Record> {
        match self.manifest.records.get(&leaf.issuer) {
            Some(issuer) if issuer.is_authority() => {}
            _ => return Err(PkiError::UnknownAuthority(leaf.issuer.clone())),
        }
        let record = self.write_pair(
            &leaf.name,
            &leaf.cert_pem,
            &leaf.key_pem,
            Some(leaf.issuer.clone()),
        )?;
        if let Some(issuer) = self.manifest.records.get_mut(&leaf.issuer) {
            issuer.signees.push(leaf.name.clone());
        }
        self.insert(&leaf.name, record)
    }

    /// Concatenates the certificates of `trusted` into the trust bundle for
    /// `component`. Returns the bundle path.
    pub fn write_trust_bundle(&mut self, component: &str, trusted: &[String]) -> PkiResult<PathBuf> {
        validate_name(component)?;

        let mut bundle = String::new();
        for name in trusted {
            let record = self
                .manifest
                .get(name)
                .filter(|r| r.is_authority())
                .ok_or_else(|| PkiError::UnknownAuthority(name.clone()))?;
            let path = self.resolve(&record.cert);
            let pem = fs::read_to_string(&path).map_err(PkiError::io(&path))?;
            bundle.push_str(&pem);
            if !pem.ends_with('\n') {
                bundle.push('\n');
            }
        }

        let relative = PathBuf::from(trust_bundle_file(component));
        let path = self.resolve(&relative);
        fs::write(&path, bundle).map_err(PkiError::io(&path))?;
        debug!("wrote trust bundle {} ({} authorities)", path.display(), trusted.len());

        if let Some(record) = self.manifest.records.get_mut(component) {
            record.trust_bundle = Some(relative);
        }
        self.save_manifest()?;
        Ok(path)
    }

    fn insert(&mut self, name: &str, record: Record) -> PkiResult<&Record> {
        self.manifest.records.insert(name.to_string(), record);
        self.save_manifest()?;
        Ok(&self.manifest.records[name])
    }

    fn write_pair(
        &self,
        name: &str,
        cert_pem: &str,
        key_pem: &str,
        issuer: Option<String>,
    ) -> PkiResult<Record> {
        validate_name(name)?;
        if self.manifest.records.contains_key(name) {
            return Err(PkiError::DuplicateRecord(name.to_string()));
        }

        let record_dir = self.dir.join(name);
        fs::create_dir_all(&record_dir).map_err(PkiError::io(&record_dir))?;

        let cert = PathBuf::from(name).join(format!("{}.crt", name));
        let key = PathBuf::from(name).join(format!("{}.key", name));

        let cert_path = self.resolve(&cert);
        fs::write(&cert_path, cert_pem).map_err(PkiError::io(&cert_path))?;
        write_private(&self.resolve(&key), key_pem)?;

        debug!("wrote {} and {}", cert.display(), key.display());

        Ok(Record {
            cert,
            key,
            issuer,
            trust_bundle: None,
            signees: Vec::new(),
        })
    }

    fn save_manifest(&self) -> PkiResult<()> {
        let path = self.dir.join(MANIFEST_FILE);
        let content = serde_yaml::to_string(&self.manifest)?;
        fs::write(&path, content).map_err(PkiError::io(&path))
    }
}

/// Writes a private key readable by the owner only.
fn write_private(path: &Path, pem: &str) -> PkiResult<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt as _;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(PkiError::io(path))?;
    file.write_all(pem.as_bytes()).map_err(PkiError::io(path))
}
