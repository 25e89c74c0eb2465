//! Certificate material as stored on disk and held in memory.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rustls::pki_types::CertificateDer;
use rustls::sign::CertifiedKey;
use serde::{Deserialize, Serialize};

use crate::error::EdgeError;

/// A PEM certificate chain, its PEM private key and its expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateMaterial {
    pub cert_pem: String,
    pub key_pem: String,
    pub not_after: DateTime<Utc>,
}

impl CertificateMaterial {
    /// Build the signing key rustls hands to the handshake.
    pub fn certified_key(&self, host: &str) -> Result<Arc<CertifiedKey>, EdgeError> {
        let invalid = |reason: String| EdgeError::CertificateIssuance {
            host: host.to_string(),
            reason,
        };

        let chain: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut self.cert_pem.as_bytes())
            .collect::<Result<_, _>>()
            .map_err(|e| invalid(format!("unreadable certificate: {e}")))?;
        if chain.is_empty() {
            return Err(invalid("no certificate in PEM".to_string()));
        }

        let key = rustls_pemfile::private_key(&mut self.key_pem.as_bytes())
            .map_err(|e| invalid(format!("unreadable private key: {e}")))?
            .ok_or_else(|| invalid("no private key in PEM".to_string()))?;
        let signing_key = rustls::crypto::aws_lc_rs::sign::any_supported_type(&key)
            .map_err(|e| invalid(format!("unsupported private key: {e}")))?;

        Ok(Arc::new(CertifiedKey::new(chain, signing_key)))
    }
}

/// Whether a certificate expiring at `not_after` is still usable.
pub fn is_fresh(not_after: DateTime<Utc>, renew_before: Duration) -> bool {
    Utc::now() < not_after - renew_before
}
