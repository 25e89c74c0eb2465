//! On-disk certificate cache: one JSON file per host.

use std::path::PathBuf;

use super::material::CertificateMaterial;
use crate::error::EdgeError;

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, host: &str) -> PathBuf {
        let file: String = host
            .chars()
            .map(|c| match c {
                'a'..='z' | '0'..='9' | '.' | '-' => c,
                _ => '_',
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }

    /// Read the cached entry for `host`. A missing file is `Ok(None)`.
    pub async fn load(&self, host: &str) -> Result<Option<CertificateMaterial>, EdgeError> {
        let path = self.path_for(host);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| EdgeError::CertificateIssuance {
                host: host.to_string(),
                reason: format!("corrupt cache entry {}: {e}", path.display()),
            })
    }

    /// Write the entry for `host`, replacing any previous one atomically.
    pub async fn store(&self, host: &str, material: &CertificateMaterial) -> Result<(), EdgeError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(host);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(material).map_err(|e| {
            EdgeError::CertificateIssuance {
                host: host.to_string(),
                reason: e.to_string(),
            }
        })?;

        tokio::fs::write(&tmp, json).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(host, path = %path.display(), "Certificate cached on disk");
        Ok(())
    }
}
