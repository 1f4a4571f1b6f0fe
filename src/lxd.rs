use anyhow::{Context, Result};
use tracing::info;

use crate::config::LxdSettings;

pub mod cert;
pub mod client;
pub mod manager;
pub mod types;

pub use cert::ClientCertificate;
pub use client::{LxdClient, TlsOptions};
pub use manager::LxdManager;
pub use types::{ExecResult, Instance, InstanceStatus, StateAction};

#[derive(Debug, thiserror::Error)]
pub enum LxdError {
    #[error("LXD request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LXD resource not found: {0}")]
    NotFound(String),
    #[error("LXD API error {code} on {path}: {message}")]
    Api {
        path: String,
        code: u16,
        message: String,
    },
    #[error("LXD operation {id} failed: {message}")]
    Operation { id: String, message: String },
    #[error("LXD response from {0} carried no operation")]
    MissingOperation(String),
    #[error("Failed to decode LXD response from {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
    #[error("Client certificate is not trusted by the LXD server")]
    Untrusted,
    #[error("Invalid TLS material: {0}")]
    Tls(String),
}

impl LxdError {
    /// Failures reported by the daemon itself, as opposed to transport or
    /// local errors.
    #[must_use]
    pub fn is_api_failure(&self) -> bool {
        matches!(
            self,
            LxdError::NotFound(_)
                | LxdError::Api { .. }
                | LxdError::Operation { .. }
                | LxdError::MissingOperation(_)
        )
    }
}

/// Builds a client from settings: loads or generates the client identity,
/// pins the server certificate and trusts the client by password when one
/// is configured.
///
/// # Errors
/// Returns error if TLS material cannot be read or authentication fails.
pub async fn connect(settings: &LxdSettings) -> Result<LxdClient> {
    let identity = match (&settings.client_cert, &settings.client_key) {
        (Some(cert), Some(key)) => Some(ClientCertificate::load(cert, key).await?),
        _ if settings.password.is_some() => {
            Some(ClientCertificate::load_or_generate(&settings.cert_dir).await?)
        }
        _ => None,
    };
    if let Some(identity) = &identity {
        info!("LXD client certificate fingerprint: {}", identity.fingerprint()?);
    }
    let server_cert_pem = match &settings.server_cert {
        Some(path) => Some(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read server cert {}", path.display()))?,
        ),
        None => None,
    };
    let tls = TlsOptions {
        identity_pem: identity.as_ref().map(ClientCertificate::identity_pem),
        verify: settings.verify_tls || server_cert_pem.is_some(),
        server_cert_pem,
    };
    let client = LxdClient::new(&settings.endpoint, &tls, settings.operation_timeout_secs)
        .context("Failed to build LXD client")?;
    if let Some(password) = &settings.password {
        client
            .authenticate(password)
            .await
            .context("LXD authentication failed")?;
    }
    Ok(client)
}
