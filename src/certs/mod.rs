//! Certificate provider.
//!
//! # Data Flow
//! ```text
//! ClientHello (SNI)
//!     → self_signed.rs (one shared pair, regenerated when stale), or
//!     → managed.rs (memory → disk cache → issuer, single-flight per host)
//!     → CertifiedKey for this handshake
//! ```
//!
//! # Design Decisions
//! - Mode is fixed at startup; `off` means no provider at all
//! - A certificate failure fails that handshake only

pub mod issuer;
pub mod managed;
pub mod material;
pub mod self_signed;
pub mod store;

use std::sync::Arc;

use rustls::sign::CertifiedKey;

use crate::config::schema::TlsConfig;
use crate::config::{TlsMode, VirtualHostConfig};
use crate::error::EdgeError;

pub use issuer::{CertificateIssuer, LocalIssuer};
pub use managed::ManagedCertificates;
pub use material::CertificateMaterial;
pub use self_signed::SelfSignedCertificate;
pub use store::DiskCache;

pub enum CertificateProvider {
    SelfSigned(SelfSignedCertificate),
    Managed(ManagedCertificates),
}

impl CertificateProvider {
    /// Provider for the configured mode, with the local issuer in managed mode.
    pub fn from_config(tls: &TlsConfig, hosts: &[VirtualHostConfig]) -> Option<Self> {
        Self::with_issuer(tls, hosts, Arc::new(LocalIssuer::new(tls.validity_days)))
    }

    pub fn with_issuer(
        tls: &TlsConfig,
        hosts: &[VirtualHostConfig],
        issuer: Arc<dyn CertificateIssuer>,
    ) -> Option<Self> {
        let names = hosts.iter().map(|h| h.host.clone());
        match tls.mode {
            TlsMode::Off => None,
            TlsMode::SelfSigned => Some(Self::SelfSigned(SelfSignedCertificate::new(
                names,
                tls.validity_days,
                tls.renew_before_days,
            ))),
            TlsMode::Managed => Some(Self::Managed(ManagedCertificates::new(
                names,
                DiskCache::new(&tls.cert_dir),
                issuer,
                tls.renew_before_days,
            ))),
        }
    }

    pub fn mode(&self) -> TlsMode {
        match self {
            Self::SelfSigned(_) => TlsMode::SelfSigned,
            Self::Managed(_) => TlsMode::Managed,
        }
    }

    pub async fn get_certificate(&self, host: &str) -> Result<Arc<CertifiedKey>, EdgeError> {
        match self {
            Self::SelfSigned(cert) => cert.get().await,
            Self::Managed(managed) => managed.get_certificate(host).await,
        }
    }
}
