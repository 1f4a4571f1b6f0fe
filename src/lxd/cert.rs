use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rcgen::{CertificateParams, DnType, ExtendedKeyUsagePurpose, KeyPair};
use ring::digest;
use tokio::fs;
use tracing::info;
use x509_parser::pem::parse_x509_pem;

const CERT_FILE_NAME: &str = "client.crt";
const KEY_FILE_NAME: &str = "client.key";
const COMMON_NAME: &str = "s9s-ft";
const KEY_FILE_MODE: u32 = 0o600;
const CERT_DIR_MODE: u32 = 0o700;

/// PEM client certificate and key presented to the LXD daemon.
#[derive(Debug, Clone)]
pub struct ClientCertificate {
    cert_pem: String,
    key_pem: String,
}

impl ClientCertificate {
    /// Generates a self-signed certificate usable for TLS client auth.
    ///
    /// # Errors
    /// Returns error if key generation or signing fails.
    pub fn generate(common_name: &str) -> Result<Self> {
        let mut params = CertificateParams::new(vec![common_name.to_string()])?;
        params
            .distinguished_name
            .push(DnType::CommonName, common_name.to_string());
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        let key = KeyPair::generate()?;
        let cert = params.self_signed(&key)?;
        Ok(Self {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        })
    }

    /// Reads an existing certificate and key.
    ///
    /// # Errors
    /// Returns error if either file cannot be read.
    pub async fn load(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let cert_pem = fs::read_to_string(cert_path)
            .await
            .with_context(|| format!("Failed to read client cert {}", cert_path.display()))?;
        let key_pem = fs::read_to_string(key_path)
            .await
            .with_context(|| format!("Failed to read client key {}", key_path.display()))?;
        Ok(Self { cert_pem, key_pem })
    }

    /// Loads `client.crt`/`client.key` from `dir`, generating and storing a
    /// new pair when either is missing.
    ///
    /// # Errors
    /// Returns error if the pair cannot be read, generated or written.
    pub async fn load_or_generate(dir: &Path) -> Result<Self> {
        let (cert_path, key_path) = paths(dir);
        if fs::try_exists(&cert_path).await.unwrap_or(false)
            && fs::try_exists(&key_path).await.unwrap_or(false)
        {
            return Self::load(&cert_path, &key_path).await;
        }
        let generated = Self::generate(COMMON_NAME)?;
        generated.store(dir).await?;
        info!(
            "Generated LXD client certificate at {}",
            cert_path.display()
        );
        Ok(generated)
    }

    async fn store(&self, dir: &Path) -> Result<()> {
        let (cert_path, key_path) = paths(dir);
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create cert dir {}", dir.display()))?;
        fs::set_permissions(dir, std::fs::Permissions::from_mode(CERT_DIR_MODE))
            .await
            .with_context(|| format!("Failed to set permissions on {}", dir.display()))?;
        fs::write(&cert_path, &self.cert_pem)
            .await
            .with_context(|| format!("Failed to write {}", cert_path.display()))?;
        fs::write(&key_path, &self.key_pem)
            .await
            .with_context(|| format!("Failed to write {}", key_path.display()))?;
        fs::set_permissions(&key_path, std::fs::Permissions::from_mode(KEY_FILE_MODE))
            .await
            .with_context(|| format!("Failed to set permissions on {}", key_path.display()))?;
        Ok(())
    }

    #[must_use]
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Certificate followed by key, as `reqwest::Identity::from_pem` expects.
    #[must_use]
    pub fn identity_pem(&self) -> Vec<u8> {
        let mut pem = Vec::with_capacity(self.cert_pem.len() + self.key_pem.len() + 1);
        pem.extend_from_slice(self.cert_pem.as_bytes());
        if !self.cert_pem.ends_with('\n') {
            pem.push(b'\n');
        }
        pem.extend_from_slice(self.key_pem.as_bytes());
        pem
    }

    /// SHA-256 fingerprint of the DER certificate, lowercase hex. This is
    /// the value `lxc config trust list` shows.
    ///
    /// # Errors
    /// Returns error if the certificate PEM cannot be parsed.
    pub fn fingerprint(&self) -> Result<String> {
        let (_, pem) = parse_x509_pem(self.cert_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to parse client certificate PEM: {e}"))?;
        if pem.label != "CERTIFICATE" {
            anyhow::bail!("Unexpected PEM label: {}", pem.label);
        }
        Ok(sha256_hex(&pem.contents))
    }
}

fn paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join(CERT_FILE_NAME), dir.join(KEY_FILE_NAME))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = digest::digest(&digest::SHA256, bytes);
    digest
        .as_ref()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_generate_produces_parseable_pair() {
        let cert = ClientCertificate::generate("ft-test").unwrap();
        assert!(cert.cert_pem().starts_with("-----BEGIN CERTIFICATE-----"));
        let identity = String::from_utf8(cert.identity_pem()).unwrap();
        assert!(identity.contains("-----BEGIN CERTIFICATE-----"));
        assert!(identity.contains("PRIVATE KEY-----"));
        let fingerprint = cert.fingerprint().unwrap();
        assert_eq!(fingerprint.len(), 64);
        assert!(fingerprint.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_load_or_generate_reuses_stored_pair() {
        let dir = tempdir().unwrap();
        let cert_dir = dir.path().join("lxd");
        let first = ClientCertificate::load_or_generate(&cert_dir).await.unwrap();
        let second = ClientCertificate::load_or_generate(&cert_dir).await.unwrap();
        assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());

        let mode = std::fs::metadata(cert_dir.join(KEY_FILE_NAME))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, KEY_FILE_MODE);
    }

    #[test]
    fn test_sha256_hex_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fingerprint_rejects_garbage() {
        let cert = ClientCertificate {
            cert_pem: "garbage".to_string(),
            key_pem: String::new(),
        };
        assert!(cert.fingerprint().is_err());
    }
}
