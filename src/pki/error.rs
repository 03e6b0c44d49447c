use std::path::PathBuf;

use crate::config::ConfigError;

/// The result type for PKI operations.
pub type PkiResult<T> = Result<T, PkiError>;

#[derive(Debug, thiserror::Error)]
pub enum PkiError {
    #[error("failed to generate certificate: {0}")]
    Generation(#[from] rcgen::Error),
    #[error("invalid DNS name: {0}")]
    InvalidDnsName(String),
    #[error("validity period of {0} does not fit in a certificate")]
    InvalidValidity(time::Duration),
    #[error("invalid record name: {0:?}")]
    InvalidName(String),
    #[error("invalid trust graph: {0}")]
    InvalidTrustGraph(String),
    #[error("record already exists: {0}")]
    DuplicateRecord(String),
    #[error("unknown authority: {0}")]
    UnknownAuthority(String),
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed store manifest: {0}")]
    Manifest(#[from] serde_yaml::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PkiError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| PkiError::Io { path, source }
    }
}
