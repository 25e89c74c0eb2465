//! Certificate issuance.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveTime, Utc};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

use super::material::CertificateMaterial;
use crate::error::EdgeError;

/// Produces a fresh certificate for one host.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    async fn issue(&self, host: &str) -> Result<CertificateMaterial, EdgeError>;
}

/// Signs per-host certificates locally.
#[derive(Debug, Clone)]
pub struct LocalIssuer {
    validity: Duration,
}

impl LocalIssuer {
    pub fn new(validity_days: u32) -> Self {
        Self {
            validity: Duration::days(i64::from(validity_days)),
        }
    }
}

#[async_trait]
impl CertificateIssuer for LocalIssuer {
    async fn issue(&self, host: &str) -> Result<CertificateMaterial, EdgeError> {
        let names = vec![host.to_string()];
        let validity = self.validity;
        let material = tokio::task::spawn_blocking(move || generate_certificate(names, validity))
            .await
            .map_err(|e| EdgeError::CertificateIssuance {
                host: host.to_string(),
                reason: format!("issuer task failed: {e}"),
            })??;
        tracing::info!(host, not_after = %material.not_after, "Certificate issued");
        Ok(material)
    }
}

/// Generate a self-signed certificate covering `names`. The first name is the subject.
pub fn generate_certificate(
    names: Vec<String>,
    validity: Duration,
) -> Result<CertificateMaterial, EdgeError> {
    let subject = names.first().cloned().unwrap_or_default();
    let failed = |e: rcgen::Error| EdgeError::CertificateIssuance {
        host: subject.clone(),
        reason: e.to_string(),
    };

    let mut params = CertificateParams::new(names).map_err(failed)?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, subject.clone());
    params.distinguished_name = dn;

    // rcgen takes whole days; record the same midnight we hand it.
    let now = Utc::now();
    let start = now - Duration::days(1);
    let end = now + validity;
    params.not_before = rcgen::date_time_ymd(start.year(), start.month() as u8, start.day() as u8);
    params.not_after = rcgen::date_time_ymd(end.year(), end.month() as u8, end.day() as u8);

    let key_pair = KeyPair::generate().map_err(failed)?;
    let cert = params.self_signed(&key_pair).map_err(failed)?;

    Ok(CertificateMaterial {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        not_after: end.date_naive().and_time(NaiveTime::MIN).and_utc(),
    })
}
