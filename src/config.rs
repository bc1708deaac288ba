//! TOML-loadable configuration for the two server binaries.

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration errors raised while loading a TOML file.
#[derive(Debug)]
pub enum Error {
    IO(io::Error),
    Parse(toml::de::Error),
}

/// Naming server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    /// Listen address, e.g. `0.0.0.0:9000`.
    pub bind: String,
    /// Path of the access-control persistence file.
    pub access_file: PathBuf,
    /// Opt-in for EXEC. Off by default: EXEC runs file contents through a
    /// shell with server privileges.
    pub exec_enabled: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9000".to_owned(),
            access_file: PathBuf::from("access_control.dat"),
            exec_enabled: false,
        }
    }
}

/// Storage server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Address of the naming server to register with.
    pub naming_addr: String,
    /// Address advertised to the naming server for redirects.
    pub advertise_ip: String,
    /// Base port. The NM-facing listener binds here and the client-facing
    /// listener binds one above.
    pub base_port: u16,
    /// Root directory of the local byte store.
    pub storage_dir: PathBuf,
    /// Pause between words while streaming, in milliseconds.
    pub stream_delay_ms: u64,
}

impl StorageConfig {
    /// Port of the client-facing listener, always one above the base port.
    pub fn client_port(&self) -> u16 {
        self.base_port + 1
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            naming_addr: "127.0.0.1:9000".to_owned(),
            advertise_ip: "127.0.0.1".to_owned(),
            base_port: 9100,
            storage_dir: PathBuf::from("storage"),
            stream_delay_ms: 100,
        }
    }
}

/// Loads a configuration value from a TOML file.
pub fn load<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let text = std::fs::read_to_string(path).map_err(Error::IO)?;
    toml::from_str(&text).map_err(Error::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_defaults() {
        let cfg: NamingConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:9000");
        assert!(!cfg.exec_enabled);
    }

    #[test]
    fn test_storage_partial_override() {
        let cfg: StorageConfig = toml::from_str("base_port = 7000").unwrap();
        assert_eq!(cfg.base_port, 7000);
        assert_eq!(cfg.client_port(), 7001);
        assert_eq!(cfg.naming_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let res: Result<NamingConfig, _> = toml::from_str("no_such_key = 1");
        assert!(res.is_err());
    }
}
