//! Provision the store, then prove it works with one mutual TLS exchange.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::FixtureConfig;
use crate::pki::{BACKEND, CertStore, PROXY_CLIENT, provision};
use crate::tls::{EchoResponder, Probe, TlsMaterials};
use crate::transcript::Transcript;

/// Which parts of the run to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Steps {
    /// Regenerate the store, then run the handshake against it.
    #[default]
    All,
    /// Regenerate the store only.
    ProvisionOnly,
    /// Run the handshake against the store already on disk.
    HandshakeOnly,
}

/// What each side received during the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeReport {
    pub server_received: String,
    pub client_received: String,
}

/// Runs the requested steps. Returns the exchange report when the
/// handshake ran.
pub async fn run(
    config: &FixtureConfig,
    steps: Steps,
    transcript: Arc<dyn Transcript>,
) -> Result<Option<SmokeReport>> {
    let store = if steps == Steps::HandshakeOnly {
        CertStore::open(&config.ssl_dir)
            .with_context(|| format!("failed to open store at {}", config.ssl_dir.display()))?
    } else {
        transcript.line(&format!(
            "Making internal ssl certificates in {}",
            config.ssl_dir.display()
        ));
        provision(config).context("failed to provision certificates")?
    };

    if steps == Steps::ProvisionOnly {
        return Ok(None);
    }

    transcript.line("Testing internal ssl setup");
    let report = run_handshake(&store, config, Arc::clone(&transcript)).await?;
    transcript.line("OK");
    Ok(Some(report))
}

/// Serves one exchange as the backend and connects to it as the proxy
/// client.
///
/// The responder is torn down once the probe returns, whether or not the
/// exchange succeeded.
pub async fn run_handshake(
    store: &CertStore,
    config: &FixtureConfig,
    transcript: Arc<dyn Transcript>,
) -> Result<SmokeReport> {
    let server = TlsMaterials::for_role(store, BACKEND).context("backend materials")?;
    let client = TlsMaterials::for_role(store, PROXY_CLIENT).context("proxy client materials")?;

    let responder = EchoResponder::bind(
        (config.host.as_str(), config.port),
        &server,
        Arc::clone(&transcript),
    )
    .await
    .context("failed to start responder")?;
    let addr = responder.local_addr()?;
    let server_task = tokio::spawn(async move { responder.serve_one().await });

    let probe = Probe::new(&client).context("failed to configure probe")?;
    let reply = match probe.ping_at(addr, &config.host).await {
        Ok(reply) => reply,
        Err(e) => {
            server_task.abort();
            return Err(e).context("client exchange failed");
        }
    };
    transcript.line(&format!("client received {}", reply));

    let received = server_task
        .await
        .context("responder task failed")?
        .context("server exchange failed")?;
    info!("exchange complete on {}", addr);

    Ok(SmokeReport {
        server_received: received,
        client_received: reply,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Recorded;

    fn config_in(dir: &std::path::Path) -> FixtureConfig {
        FixtureConfig {
            ssl_dir: dir.to_path_buf(),
            host: "127.0.0.1".to_string(),
            port: 0,
            ..FixtureConfig::default()
        }
    }

    /// Tests the whole run and the order of the progress lines.
    #[tokio::test]
    async fn end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let transcript = Arc::new(Recorded::new());

        let report = run(&config, Steps::All, transcript.clone())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            report,
            SmokeReport {
                server_received: "ping".to_string(),
                client_received: "pong".to_string(),
            }
        );
        assert_eq!(
            transcript.lines(),
            vec![
                format!("Making internal ssl certificates in {}", tmp.path().display()),
                "Testing internal ssl setup".to_string(),
                "client connected".to_string(),
                "server received ping".to_string(),
                "client received pong".to_string(),
                "OK".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn provision_only_skips_handshake() {
        let tmp = tempfile::tempdir().unwrap();
        let transcript = Arc::new(Recorded::new());

        let report = run(&config_in(tmp.path()), Steps::ProvisionOnly, transcript.clone())
            .await
            .unwrap();

        assert!(report.is_none());
        assert_eq!(transcript.lines().len(), 1);
        assert!(tmp.path().join("backend/backend.crt").exists());
    }

    /// Tests reusing a store from an earlier run without regenerating it.
    #[tokio::test]
    async fn handshake_only_reuses_store() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        provision(&config).unwrap();
        let cert = std::fs::read(tmp.path().join("backend/backend.crt")).unwrap();

        let report = run(&config, Steps::HandshakeOnly, Arc::new(Recorded::new()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.client_received, "pong");
        assert_eq!(
            std::fs::read(tmp.path().join("backend/backend.crt")).unwrap(),
            cert
        );
    }

    #[tokio::test]
    async fn handshake_only_without_store_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let result = run(
            &config_in(&tmp.path().join("missing")),
            Steps::HandshakeOnly,
            Arc::new(Recorded::new()),
        )
        .await;
        assert!(result.is_err());
    }

    /// Running twice in a row replaces the store and still passes.
    #[tokio::test]
    async fn rerun_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        for _ in 0..2 {
            let report = run(&config, Steps::All, Arc::new(Recorded::new()))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(report.server_received, "ping");
        }
    }
}
