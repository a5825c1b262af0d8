//! Configuration module for the roster backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::models::Collection;

/// Invalid configuration value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("{0} is set but no sync token was found (ROSTER_SYNC_TOKEN or GITHUB_TOKEN)")]
    MissingToken(&'static str),
}

/// Where the roster is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Csv { data_dir: PathBuf },
    Sqlite { db_path: PathBuf },
}

/// Remote push of the CSV files to a GitHub repository.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the contents API
    pub api_url: String,
    /// Repository as `owner/name`
    pub repo: String,
    pub branch: String,
    pub token: String,
    /// Collections to upload, in order
    pub collections: Vec<Collection>,
    /// Push after every successful mutation
    pub on_save: bool,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    pub storage: StorageBackend,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of plain text
    pub log_json: bool,
    /// Remote sync, if a repository is configured
    pub sync: Option<SyncConfig>,
}

impl Config {
    /// Load configuration from environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_psk = var("ROSTER_API_PSK");

        let storage = match var("ROSTER_STORAGE")
            .unwrap_or_else(|| "csv".to_string())
            .to_lowercase()
            .as_str()
        {
            "csv" => StorageBackend::Csv {
                data_dir: var("ROSTER_DATA_DIR")
                    .unwrap_or_else(|| "./data".to_string())
                    .into(),
            },
            "sqlite" => StorageBackend::Sqlite {
                db_path: var("ROSTER_DB_PATH")
                    .unwrap_or_else(|| "./data/roster.sqlite".to_string())
                    .into(),
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "ROSTER_STORAGE",
                    message: format!("expected 'csv' or 'sqlite', got '{}'", other),
                })
            }
        };

        let bind_addr = var("ROSTER_BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "ROSTER_BIND_ADDR",
                message: format!("{}", e),
            })?;

        let log_level = var("ROSTER_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_json = match var("ROSTER_LOG_FORMAT").map(|f| f.to_lowercase()).as_deref() {
            None | Some("text") => false,
            Some("json") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "ROSTER_LOG_FORMAT",
                    message: format!("expected 'text' or 'json', got '{}'", other),
                })
            }
        };

        let sync = match var("ROSTER_SYNC_REPO") {
            None => None,
            Some(repo) => {
                let token = var("ROSTER_SYNC_TOKEN")
                    .or_else(|| var("GITHUB_TOKEN"))
                    .ok_or(ConfigError::MissingToken("ROSTER_SYNC_REPO"))?;

                let collections = match var("ROSTER_SYNC_COLLECTIONS") {
                    Some(list) => parse_collections(&list)?,
                    None => Collection::ALL.to_vec(),
                };

                let on_save = match var("ROSTER_SYNC_ON_SAVE") {
                    Some(flag) => parse_bool("ROSTER_SYNC_ON_SAVE", &flag)?,
                    None => true,
                };

                Some(SyncConfig {
                    api_url: var("ROSTER_SYNC_API_URL")
                        .unwrap_or_else(|| "https://api.github.com".to_string())
                        .trim_end_matches('/')
                        .to_string(),
                    repo: repo.trim().to_string(),
                    branch: var("ROSTER_SYNC_BRANCH").unwrap_or_else(|| "master".to_string()),
                    token,
                    collections,
                    on_save,
                })
            }
        };

        Ok(Self {
            api_psk,
            storage,
            bind_addr,
            log_level,
            log_json,
            sync,
        })
    }
}

fn parse_collections(list: &str) -> Result<Vec<Collection>, ConfigError> {
    let mut collections = Vec::new();
    for item in list.split(',').filter(|s| !s.trim().is_empty()) {
        let collection = item.parse::<Collection>().map_err(|message| ConfigError::Invalid {
            key: "ROSTER_SYNC_COLLECTIONS",
            message,
        })?;
        if !collections.contains(&collection) {
            collections.push(collection);
        }
    }
    Ok(collections)
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}
