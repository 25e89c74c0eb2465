//! Configuration loading from disk.
//!
//! Parsing only: CLI overrides are applied afterwards and
//! `validation::validate_config` runs on the merged result.

use std::fs;
use std::path::Path;

use crate::config::schema::EdgeConfig;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<EdgeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::validate_config;
    use std::io::Write;

    #[test]
    fn reads_a_minimal_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[tls]\nmode = \"off\"\n\n[[hosts]]\nhost = \"example.com\"\n"
        )
        .unwrap();

        let config = read_config(file.path()).unwrap();
        assert_eq!(config.hosts.len(), 1);
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn reading_does_not_validate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\naddress = \"bad\"\n").unwrap();

        let config = read_config(file.path()).unwrap();
        assert_eq!(config.listener.address, "bad");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn reports_parse_and_io_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener\n").unwrap();
        assert!(matches!(read_config(file.path()), Err(ConfigError::Parse(_))));

        let missing = file.path().with_extension("missing");
        assert!(matches!(read_config(&missing), Err(ConfigError::Io(_))));
    }
}
