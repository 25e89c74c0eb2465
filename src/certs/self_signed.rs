//! One self-signed certificate shared by every handshake, regenerated once it
//! enters its renewal window.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rustls::sign::CertifiedKey;
use tokio::sync::Mutex;

use super::issuer::generate_certificate;
use super::material::is_fresh;
use crate::error::EdgeError;
use crate::observability::metrics;

struct Current {
    key: Arc<CertifiedKey>,
    not_after: DateTime<Utc>,
}

pub struct SelfSignedCertificate {
    names: Vec<String>,
    validity: Duration,
    renew_before: Duration,
    current: Mutex<Option<Current>>,
}

impl SelfSignedCertificate {
    /// Covers `names` plus `localhost`.
    pub fn new(
        names: impl IntoIterator<Item = String>,
        validity_days: u32,
        renew_before_days: u32,
    ) -> Self {
        let mut all: Vec<String> = Vec::new();
        for name in names.into_iter().chain(std::iter::once("localhost".to_string())) {
            if !name.is_empty() && !all.contains(&name) {
                all.push(name);
            }
        }
        Self {
            names: all,
            validity: Duration::days(i64::from(validity_days)),
            renew_before: Duration::days(i64::from(renew_before_days)),
            current: Mutex::new(None),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The certificate, generated on first use and again once it goes stale.
    pub async fn get(&self) -> Result<Arc<CertifiedKey>, EdgeError> {
        // Held across generation so concurrent handshakes wait for one pair.
        let mut current = self.current.lock().await;
        if let Some(cert) = current.as_ref() {
            if is_fresh(cert.not_after, self.renew_before) {
                return Ok(Arc::clone(&cert.key));
            }
            tracing::info!(not_after = %cert.not_after, "Self-signed certificate due for renewal");
        }

        let names = self.names.clone();
        let validity = self.validity;
        let material = tokio::task::spawn_blocking(move || generate_certificate(names, validity))
            .await
            .map_err(|e| EdgeError::CertificateIssuance {
                host: "localhost".to_string(),
                reason: format!("generator task failed: {e}"),
            })??;
        let key = material.certified_key("localhost")?;
        metrics::record_certificate_issued("self-signed");
        tracing::info!(names = ?self.names, not_after = %material.not_after, "Self-signed certificate generated");

        *current = Some(Current {
            key: Arc::clone(&key),
            not_after: material.not_after,
        });
        Ok(key)
    }

    #[cfg(test)]
    async fn expire_now(&self) {
        if let Some(cert) = self.current.lock().await.as_mut() {
            cert.not_after = Utc::now() - Duration::days(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_covers_localhost_once() {
        let cert = SelfSignedCertificate::new(
            vec!["example.com".to_string(), "localhost".to_string(), String::new()],
            1,
            0,
        );
        assert_eq!(cert.names(), ["example.com", "localhost"]);
    }

    #[tokio::test]
    async fn generated_once_while_fresh() {
        let cert = SelfSignedCertificate::new(Vec::new(), 90, 30);
        let a = cert.get().await.unwrap();
        let b = cert.get().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn regenerated_after_expiry() {
        let cert = SelfSignedCertificate::new(Vec::new(), 90, 30);
        let original = cert.get().await.unwrap();

        cert.expire_now().await;
        let renewed = cert.get().await.unwrap();
        assert!(!Arc::ptr_eq(&original, &renewed));
        assert_ne!(original.cert, renewed.cert);

        let again = cert.get().await.unwrap();
        assert!(Arc::ptr_eq(&renewed, &again));
    }
}
