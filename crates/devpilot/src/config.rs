//! Settings read from the process environment (after an optional `.env` file).

use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::github::GITHUB_API_URL;
use crate::providers::configs::{OllamaProviderConfig, OLLAMA_HOST, OLLAMA_MODEL};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Map a settings field name back to the variable that feeds it
pub fn to_env_var(field: &str) -> String {
    field.to_uppercase()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub gh_access_token: Option<String>,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_key: Option<String>,

    #[serde(default)]
    pub alert_email_sender: Option<String>,
    #[serde(default)]
    pub alert_email_password: Option<String>,
    #[serde(default)]
    pub alert_email_recipient: Option<String>,
    #[serde(default = "default_smtp_host")]
    pub alert_smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub alert_smtp_port: u16,

    #[serde(default = "default_ollama_host")]
    pub ollama_host: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    #[serde(default)]
    pub ollama_temperature: f32,

    #[serde(default)]
    pub devpilot_prompt_template: Option<PathBuf>,
    #[serde(default = "default_host")]
    pub devpilot_host: String,
    #[serde(default = "default_port")]
    pub devpilot_port: u16,
}

/// Everything needed to send an alert email
#[derive(Debug, Clone, PartialEq)]
pub struct EmailSettings {
    pub sender: String,
    pub password: String,
    pub recipient: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gh_access_token: None,
            github_api_url: default_github_api_url(),
            supabase_url: None,
            supabase_key: None,
            alert_email_sender: None,
            alert_email_password: None,
            alert_email_recipient: None,
            alert_smtp_host: default_smtp_host(),
            alert_smtp_port: default_smtp_port(),
            ollama_host: default_ollama_host(),
            ollama_model: default_ollama_model(),
            ollama_temperature: 0.0,
            devpilot_prompt_template: None,
            devpilot_host: default_host(),
            devpilot_port: default_port(),
        }
    }
}

impl Settings {
    /// Load `.env` from the working directory if present, then read the environment
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!("no .env file loaded: {}", e);
        }
        Self::new()
    }

    /// Read settings from the environment only
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Values stay strings until serde reads them into the typed fields
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    pub fn ollama_config(&self) -> OllamaProviderConfig {
        let host = self.ollama_host.trim();
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        OllamaProviderConfig {
            host,
            model: self.ollama_model.clone(),
            temperature: Some(self.ollama_temperature),
            max_tokens: None,
        }
    }

    /// Supabase URL and key, or the first variable that is missing
    pub fn supabase_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let url = self
            .supabase_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar {
                env_var: to_env_var("supabase_url"),
            })?;
        let key = self
            .supabase_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar {
                env_var: to_env_var("supabase_key"),
            })?;
        Ok((url, key))
    }

    /// Alert email settings, only when sender, password and recipient are all set
    pub fn email(&self) -> Option<EmailSettings> {
        Some(EmailSettings {
            sender: self.alert_email_sender.clone()?,
            password: self.alert_email_password.clone()?,
            recipient: self.alert_email_recipient.clone()?,
            smtp_host: self.alert_smtp_host.clone(),
            smtp_port: self.alert_smtp_port,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.devpilot_host, self.devpilot_port).parse()
    }
}

fn default_github_api_url() -> String {
    GITHUB_API_URL.to_string()
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_ollama_host() -> String {
    OLLAMA_HOST.to_string()
}

fn default_ollama_model() -> String {
    OLLAMA_MODEL.to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8501
}
