//! TLS termination with SNI-driven certificate lookup.
//!
//! The ClientHello is read first, the certificate for its server name is
//! resolved asynchronously (possibly issuing one), then the handshake completes
//! with a config built around that single certificate.

use std::sync::Arc;
use std::time::Duration;

use rustls::server::{Acceptor, ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_rustls::LazyConfigAcceptor;

use crate::certs::CertificateProvider;
use crate::error::EdgeError;
use crate::routing::matcher::normalize_host;

pub struct TlsTerminator {
    provider: Arc<CertificateProvider>,
    handshake_timeout: Duration,
    default_server_name: Option<String>,
}

impl TlsTerminator {
    pub fn new(
        provider: Arc<CertificateProvider>,
        handshake_timeout: Duration,
        default_server_name: Option<String>,
    ) -> Self {
        Self {
            provider,
            handshake_timeout,
            default_server_name: default_server_name.map(|n| normalize_host(&n)),
        }
    }

    /// Complete the handshake within the configured timeout.
    pub async fn accept(&self, stream: TcpStream) -> Result<TlsStream<TcpStream>, EdgeError> {
        tokio::time::timeout(self.handshake_timeout, self.handshake(stream))
            .await
            .map_err(|_| {
                EdgeError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "TLS handshake timed out",
                ))
            })?
    }

    async fn handshake(&self, stream: TcpStream) -> Result<TlsStream<TcpStream>, EdgeError> {
        let start = LazyConfigAcceptor::new(Acceptor::default(), stream).await?;

        let server_name = start
            .client_hello()
            .server_name()
            .map(normalize_host)
            .or_else(|| self.default_server_name.clone())
            .ok_or_else(|| EdgeError::CertificateIssuance {
                host: String::new(),
                reason: "client sent no server name".to_string(),
            })?;

        let key = self.provider.get_certificate(&server_name).await?;
        let stream = start.into_stream(server_config(key)).await?;
        Ok(stream)
    }
}

fn server_config(key: Arc<CertifiedKey>) -> Arc<ServerConfig> {
    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(FixedCertificate(key)));
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Arc::new(config)
}

/// Resolver for a certificate already chosen from the ClientHello.
#[derive(Debug)]
struct FixedCertificate(Arc<CertifiedKey>);

impl ResolvesServerCert for FixedCertificate {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(Arc::clone(&self.0))
    }
}
