//! TLS material for `wss://` listeners.
//!
//! Key and certificate are given either inline as PEM or as file paths. Paths
//! are read when a server starts, not when the plugin is built.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use multiwire_transport_traits::{TransportError, TransportResult};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use serde::{Deserialize, Serialize};
use tokio_rustls::TlsAcceptor;

/// One PEM document, inline or on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMaterial {
    /// PEM text
    Pem(String),
    /// Path to a PEM file
    Path(PathBuf),
}

impl TlsMaterial {
    /// Returns the PEM bytes, reading the file for [`TlsMaterial::Path`].
    pub fn load(&self) -> TransportResult<Vec<u8>> {
        match self {
            Self::Pem(pem) => Ok(pem.as_bytes().to_vec()),
            Self::Path(path) => fs::read(path).map_err(|e| {
                TransportError::Tls(format!("failed to read '{}': {e}", path.display()))
            }),
        }
    }
}

/// Private key and certificate chain for a `wss://` listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM private key
    pub key: TlsMaterial,
    /// PEM certificate chain
    pub cert: TlsMaterial,
}

impl TlsConfig {
    /// Key and certificate from files.
    pub fn from_files(key: impl Into<PathBuf>, cert: impl Into<PathBuf>) -> Self {
        Self {
            key: TlsMaterial::Path(key.into()),
            cert: TlsMaterial::Path(cert.into()),
        }
    }

    /// Key and certificate given inline.
    pub fn from_pem(key: impl Into<String>, cert: impl Into<String>) -> Self {
        Self {
            key: TlsMaterial::Pem(key.into()),
            cert: TlsMaterial::Pem(cert.into()),
        }
    }

    /// Loads the material and builds a rustls acceptor.
    pub fn acceptor(&self) -> TransportResult<TlsAcceptor> {
        let cert_pem = self.cert.load()?;
        let key_pem = self.key.load()?;

        let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_pem.as_slice())
            .collect::<Result<_, _>>()
            .map_err(|e| TransportError::Tls(format!("invalid certificate: {e}")))?;
        if certs.is_empty() {
            return Err(TransportError::Tls("no certificate found".into()));
        }

        let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_pem.as_slice())
            .map_err(|e| TransportError::Tls(format!("invalid private key: {e}")))?
            .ok_or_else(|| TransportError::Tls("no private key found".into()))?;

        // rustls 0.23 needs a process-wide provider; a second install is a no-op error
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}
