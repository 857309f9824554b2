use devpilot::config::{ConfigError, Settings};
use std::net::{AddrParseError, SocketAddr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerConfigError {
    #[error(transparent)]
    Settings(#[from] ConfigError),
    #[error("Invalid DEVPILOT_HOST/DEVPILOT_PORT: {0}")]
    Address(#[from] AddrParseError),
}

/// Where to listen plus the settings the chat session is built from
#[derive(Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub settings: Settings,
}

impl ServerConfig {
    pub fn from_settings(settings: Settings) -> Result<Self, ServerConfigError> {
        let addr = settings.socket_addr()?;
        Ok(Self { addr, settings })
    }

    /// Read `.env` and the environment
    pub fn load() -> Result<Self, ServerConfigError> {
        Self::from_settings(Settings::load()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        env::remove_var("DEVPILOT_HOST");
        env::remove_var("DEVPILOT_PORT");
    }

    #[test]
    #[serial]
    fn test_default_address() {
        clean_env();
        let config = ServerConfig::from_settings(Settings::new().unwrap()).unwrap();
        assert_eq!(config.addr.to_string(), "127.0.0.1:8501");
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("DEVPILOT_HOST", "0.0.0.0");
        env::set_var("DEVPILOT_PORT", "9000");

        let config = ServerConfig::from_settings(Settings::new().unwrap()).unwrap();
        assert_eq!(config.addr.to_string(), "0.0.0.0:9000");

        clean_env();
    }

    #[test]
    fn test_bad_host_is_rejected() {
        let settings = Settings {
            devpilot_host: "not a host".to_string(),
            ..Settings::default()
        };
        let err = ServerConfig::from_settings(settings).unwrap_err();
        assert!(matches!(err, ServerConfigError::Address(_)));
    }
}
