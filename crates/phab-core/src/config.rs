use crate::context::DiscoveryTrait;
use crate::error::SourceError;
use crate::types::FetchMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings of one Phabricator source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub id: String,
    /// Base URL of the Phabricator instance, without trailing slash.
    pub server_url: Option<String>,
    /// Credentials used for Conduit calls.
    pub api_credentials_id: Option<String>,
    /// PHID of the Diffusion repository.
    pub repository: String,
    /// Credentials used by the checkout.
    pub repo_credentials_id: Option<String>,
    #[serde(default)]
    pub fetch_mode: FetchMode,
    #[serde(default = "default_traits")]
    pub traits: Vec<DiscoveryTrait>,
}

fn default_traits() -> Vec<DiscoveryTrait> {
    vec![
        DiscoveryTrait::BranchDiscovery,
        DiscoveryTrait::RevisionDiscovery,
    ]
}

impl SourceConfig {
    pub fn new(id: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            server_url: None,
            api_credentials_id: None,
            repository: repository.into(),
            repo_credentials_id: None,
            fetch_mode: FetchMode::default(),
            traits: default_traits(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SourceError> {
        let config: SourceConfig = toml::from_str(content).map_err(|err| SourceError::Config {
            message: err.to_string(),
        })?;
        config.normalized()
    }

    pub fn with_server_url(mut self, url: Option<&str>) -> Self {
        self.server_url = fix_empty(url).map(|url| url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_api_credentials_id(mut self, id: Option<&str>) -> Self {
        self.api_credentials_id = fix_empty(id).map(str::to_string);
        self
    }

    pub fn with_repo_credentials_id(mut self, id: Option<&str>) -> Self {
        self.repo_credentials_id = fix_empty(id).map(str::to_string);
        self
    }

    fn normalized(self) -> Result<Self, SourceError> {
        if self.repository.trim().is_empty() {
            return Err(SourceError::Config {
                message: "repository is required".to_string(),
            });
        }
        let server_url = self.server_url.clone();
        let api_credentials_id = self.api_credentials_id.clone();
        let repo_credentials_id = self.repo_credentials_id.clone();
        Ok(self
            .with_server_url(server_url.as_deref())
            .with_api_credentials_id(api_credentials_id.as_deref())
            .with_repo_credentials_id(repo_credentials_id.as_deref()))
    }
}

pub fn load_source_config(path: &Path) -> Result<SourceConfig, SourceError> {
    let content = fs::read_to_string(path).map_err(|err| SourceError::Config {
        message: format!("{}: {err}", path.display()),
    })?;
    SourceConfig::from_toml_str(&content)
}

fn fix_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}
