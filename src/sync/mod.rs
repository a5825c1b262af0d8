//! Push of the roster CSV files to a GitHub repository.
//!
//! Uses the contents API: the current blob `sha` is fetched first so that an
//! existing file is updated, otherwise the file is created.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::models::SyncOutcome;
use crate::roster::Roster;
use crate::store::{encode_collection, StoreError};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Failure while pushing a single file.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote rejected {file_name} with status {status}: {body}")]
    Rejected {
        file_name: String,
        status: StatusCode,
        body: String,
    },

    #[error(transparent)]
    Encode(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
struct ContentsInfo {
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

/// Client for the remote contents store.
pub struct RemoteSync {
    client: Client,
    config: SyncConfig,
}

impl RemoteSync {
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .user_agent(concat!("roster-backend/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, config })
    }

    /// Whether a push should follow every successful mutation.
    pub fn on_save(&self) -> bool {
        self.config.on_save
    }

    /// Upload every configured collection. Failures are reported per file.
    pub async fn push(&self, roster: &Roster) -> Vec<SyncOutcome> {
        let mut outcomes = Vec::with_capacity(self.config.collections.len());

        for &collection in &self.config.collections {
            let file_name = collection.file_name();
            let result = match encode_collection(collection, roster.collection(collection)) {
                Ok(content) => self.push_file(file_name, &content).await,
                Err(e) => Err(e.into()),
            };

            let outcome = match result {
                Ok(created) => {
                    tracing::info!(
                        "Uploaded {} to {} on {} branch",
                        file_name,
                        self.config.repo,
                        self.config.branch
                    );
                    SyncOutcome::uploaded(file_name, created)
                }
                Err(e) => {
                    tracing::warn!("Failed to upload {}: {}", file_name, e);
                    SyncOutcome::failed(file_name, e.to_string())
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Create or update one file. Returns true when the file was created.
    async fn push_file(&self, file_name: &str, content: &[u8]) -> Result<bool, SyncError> {
        let url = self.file_url(file_name);
        let sha = self.current_sha(&url, file_name).await?;

        let body = PutContents {
            message: format!("Update {}", file_name),
            content: STANDARD.encode(content),
            branch: &self.config.branch,
            sha,
        };

        let response = self
            .client
            .put(&url)
            .header(AUTHORIZATION, format!("token {}", self.config.token))
            .header(ACCEPT, GITHUB_ACCEPT)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(false),
            StatusCode::CREATED => Ok(true),
            status => Err(SyncError::Rejected {
                file_name: file_name.to_string(),
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// The `sha` of the existing remote file, if there is one.
    async fn current_sha(&self, url: &str, file_name: &str) -> Result<Option<String>, SyncError> {
        let response = self
            .client
            .get(url)
            .query(&[("ref", self.config.branch.as_str())])
            .header(AUTHORIZATION, format!("token {}", self.config.token))
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let info: ContentsInfo = response.json().await?;
                Ok(info.sha.filter(|s| !s.is_empty()))
            }
            status => Err(SyncError::Rejected {
                file_name: file_name.to_string(),
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    fn file_url(&self, file_name: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_url, self.config.repo, file_name
        )
    }
}
