use phab_conduit::{ConduitError, ConduitTransport, DiffusionClient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConduitCredentials {
    pub url: String,
    pub token: String,
}

pub trait CredentialStore {
    fn conduit_credentials(&self, id: &str) -> Option<ConduitCredentials>;
}

impl CredentialStore for HashMap<String, ConduitCredentials> {
    fn conduit_credentials(&self, id: &str) -> Option<ConduitCredentials> {
        self.get(id).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Ok,
    Warning(String),
}

/// Checks that `id` names usable Conduit credentials by pinging the server
/// they point at. Problems are reported, never raised.
pub fn validate_api_credentials<S, T, F>(id: &str, store: &S, connect: F) -> Validation
where
    S: CredentialStore,
    T: ConduitTransport,
    F: FnOnce(&ConduitCredentials) -> T,
{
    if id.is_empty() {
        return Validation::Warning(
            "Credentials are required to retrieve possible Phabricator repositories".to_string(),
        );
    }
    let Some(credentials) = store.conduit_credentials(id).filter(|c| !c.url.is_empty()) else {
        return Validation::Warning("Credentials are missing url".to_string());
    };
    let transport = connect(&credentials);
    match DiffusionClient::new(&transport).ping() {
        Ok(()) => Validation::Ok,
        Err(err) => {
            warn!(url = %credentials.url, error = %err, "conduit ping failed");
            Validation::Warning(format!("Could not connect to {}", credentials.url))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryChoice {
    pub name: String,
    pub phid: String,
}

/// The active repositories a source can be pointed at, ordered by name.
pub fn repository_choices<T: ConduitTransport>(
    transport: &T,
) -> Result<Vec<RepositoryChoice>, ConduitError> {
    Ok(DiffusionClient::new(transport)
        .active_repositories()?
        .into_iter()
        .map(|repository| RepositoryChoice {
            name: repository.name,
            phid: repository.phid,
        })
        .collect())
}
