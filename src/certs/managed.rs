//! Per-host certificates: memory, then disk, then the issuer.
//!
//! # Design Decisions
//! - Only configured hosts get certificates
//! - Issuance is single-flight per host: a per-host async mutex, with the
//!   caches re-checked after it is acquired
//! - Entries are replaced wholesale once inside the renewal window

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rustls::sign::CertifiedKey;
use tokio::sync::Mutex;

use super::issuer::CertificateIssuer;
use super::material::{is_fresh, CertificateMaterial};
use super::store::DiskCache;
use crate::error::EdgeError;
use crate::observability::metrics;
use crate::routing::matcher::normalize_host;

struct CachedCertificate {
    key: Arc<CertifiedKey>,
    not_after: DateTime<Utc>,
}

pub struct ManagedCertificates {
    allowed: HashSet<String>,
    memory: DashMap<String, CachedCertificate>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    disk: DiskCache,
    issuer: Arc<dyn CertificateIssuer>,
    renew_before: Duration,
}

impl ManagedCertificates {
    pub fn new<I>(
        hosts: I,
        disk: DiskCache,
        issuer: Arc<dyn CertificateIssuer>,
        renew_before_days: u32,
    ) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let allowed = hosts
            .into_iter()
            .map(|h| normalize_host(h.as_ref()))
            .filter(|h| !h.is_empty())
            .collect();
        Self {
            allowed,
            memory: DashMap::new(),
            in_flight: DashMap::new(),
            disk,
            issuer,
            renew_before: Duration::days(i64::from(renew_before_days)),
        }
    }

    pub fn is_allowed(&self, host: &str) -> bool {
        self.allowed.contains(host)
    }

    pub async fn get_certificate(&self, host: &str) -> Result<Arc<CertifiedKey>, EdgeError> {
        let host = normalize_host(host);
        if !self.is_allowed(&host) {
            return Err(EdgeError::CertificateIssuance {
                host,
                reason: "host is not configured".to_string(),
            });
        }

        if let Some(key) = self.cached(&host) {
            return Ok(key);
        }

        let lock = Arc::clone(self.in_flight.entry(host.clone()).or_default().value());
        let _held = lock.lock().await;

        // Another handshake may have filled the cache while we waited.
        if let Some(key) = self.cached(&host) {
            return Ok(key);
        }

        if let Some(key) = self.from_disk(&host).await {
            return Ok(key);
        }

        let material = self.issuer.issue(&host).await?;
        self.disk.store(&host, &material).await?;
        metrics::record_certificate_issued("managed");
        self.remember(&host, &material)
    }

    fn cached(&self, host: &str) -> Option<Arc<CertifiedKey>> {
        let entry = self.memory.get(host)?;
        is_fresh(entry.not_after, self.renew_before).then(|| Arc::clone(&entry.key))
    }

    async fn from_disk(&self, host: &str) -> Option<Arc<CertifiedKey>> {
        let material = match self.disk.load(host).await {
            Ok(Some(material)) => material,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(host, error = %e, "Ignoring unreadable cached certificate");
                return None;
            }
        };
        if !is_fresh(material.not_after, self.renew_before) {
            tracing::info!(host, not_after = %material.not_after, "Cached certificate due for renewal");
            return None;
        }
        match self.remember(host, &material) {
            Ok(key) => {
                tracing::debug!(host, "Certificate loaded from disk cache");
                Some(key)
            }
            Err(e) => {
                tracing::warn!(host, error = %e, "Ignoring unusable cached certificate");
                None
            }
        }
    }

    fn remember(
        &self,
        host: &str,
        material: &CertificateMaterial,
    ) -> Result<Arc<CertifiedKey>, EdgeError> {
        let key = material.certified_key(host)?;
        self.memory.insert(
            host.to_string(),
            CachedCertificate {
                key: Arc::clone(&key),
                not_after: material.not_after,
            },
        );
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::issuer::{generate_certificate, LocalIssuer};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingIssuer {
        issued: AtomicUsize,
    }

    #[async_trait]
    impl CertificateIssuer for CountingIssuer {
        async fn issue(&self, host: &str) -> Result<CertificateMaterial, EdgeError> {
            self.issued.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            generate_certificate(vec![host.to_string()], Duration::days(90))
        }
    }

    #[tokio::test]
    async fn concurrent_cold_handshakes_issue_once() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = Arc::new(CountingIssuer {
            issued: AtomicUsize::new(0),
        });
        let managed = Arc::new(ManagedCertificates::new(
            ["example.com"],
            DiskCache::new(dir.path()),
            issuer.clone(),
            30,
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let managed = Arc::clone(&managed);
            handles.push(tokio::spawn(async move {
                managed.get_certificate("Example.com").await.unwrap()
            }));
        }
        let mut keys = Vec::new();
        for handle in handles {
            keys.push(handle.await.unwrap());
        }

        assert_eq!(issuer.issued.load(Ordering::SeqCst), 1);
        assert!(keys.iter().all(|k| k.cert == keys[0].cert));
        assert!(dir.path().join("example.com.json").exists());
    }

    #[tokio::test]
    async fn sequential_handshakes_hit_the_memory_cache() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = Arc::new(CountingIssuer {
            issued: AtomicUsize::new(0),
        });
        let managed = ManagedCertificates::new(
            ["example.com"],
            DiskCache::new(dir.path()),
            issuer.clone(),
            30,
        );

        for _ in 0..5 {
            managed.get_certificate("example.com").await.unwrap();
        }
        assert_eq!(issuer.issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unconfigured_hosts_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let managed = ManagedCertificates::new(
            ["example.com"],
            DiskCache::new(dir.path()),
            Arc::new(LocalIssuer::new(90)),
            30,
        );
        assert!(managed.get_certificate("evil.example").await.is_err());
    }

    #[tokio::test]
    async fn restarts_reuse_the_disk_cache() {
        let dir = tempfile::tempdir().unwrap();
        let first_issuer = Arc::new(CountingIssuer {
            issued: AtomicUsize::new(0),
        });
        let first = ManagedCertificates::new(
            ["example.com"],
            DiskCache::new(dir.path()),
            first_issuer.clone(),
            30,
        );
        let original = first.get_certificate("example.com").await.unwrap();

        let second_issuer = Arc::new(CountingIssuer {
            issued: AtomicUsize::new(0),
        });
        let second = ManagedCertificates::new(
            ["example.com"],
            DiskCache::new(dir.path()),
            second_issuer.clone(),
            30,
        );
        let reloaded = second.get_certificate("example.com").await.unwrap();

        assert_eq!(second_issuer.issued.load(Ordering::SeqCst), 0);
        assert_eq!(original.cert, reloaded.cert);
    }

    #[tokio::test]
    async fn stale_disk_entries_are_reissued() {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskCache::new(dir.path());
        let mut stale = generate_certificate(vec!["example.com".into()], Duration::days(90)).unwrap();
        stale.not_after = Utc::now() + Duration::days(2);
        disk.store("example.com", &stale).await.unwrap();

        let issuer = Arc::new(CountingIssuer {
            issued: AtomicUsize::new(0),
        });
        let managed = ManagedCertificates::new(["example.com"], disk, issuer.clone(), 30);
        managed.get_certificate("example.com").await.unwrap();

        assert_eq!(issuer.issued.load(Ordering::SeqCst), 1);
    }
}
