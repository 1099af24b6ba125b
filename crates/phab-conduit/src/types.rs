use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VcsKind {
    Git,
    Mercurial,
    Subversion,
    Other(String),
}

impl From<String> for VcsKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "git" => Self::Git,
            "hg" => Self::Mercurial,
            "svn" => Self::Subversion,
            _ => Self::Other(value),
        }
    }
}

impl From<VcsKind> for String {
    fn from(value: VcsKind) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git => f.write_str("git"),
            Self::Mercurial => f.write_str("hg"),
            Self::Subversion => f.write_str("svn"),
            Self::Other(tag) => f.write_str(tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryUri {
    pub uri: String,
    pub display: String,
}

impl RepositoryUri {
    pub fn is_visible(&self) -> bool {
        self.display == "always"
    }
}

/// A Diffusion repository as returned by `diffusion.repository.search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub phid: String,
    pub name: String,
    pub vcs: VcsKind,
    pub uris: Vec<RepositoryUri>,
}

impl Repository {
    /// The clone URL shown to users: the first URI displayed "always",
    /// falling back to the first URI of any visibility.
    pub fn primary_url(&self) -> Option<&str> {
        self.uris
            .iter()
            .find(|uri| uri.is_visible())
            .or_else(|| self.uris.first())
            .map(|uri| uri.uri.as_str())
    }
}

/// An open branch of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: String,
    pub last_modified: DateTime<Utc>,
}

/// The staged push recorded for one Differential revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedDiff {
    pub remote_uri: String,
    pub ref_name: String,
    pub commit: String,
    pub base_ref: String,
    pub revision_id: u64,
    pub revision_created: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(uri: &str, display: &str) -> RepositoryUri {
        RepositoryUri {
            uri: uri.to_string(),
            display: display.to_string(),
        }
    }

    fn repository(uris: Vec<RepositoryUri>) -> Repository {
        Repository {
            phid: "PHID-REPO-1".to_string(),
            name: "example".to_string(),
            vcs: VcsKind::Git,
            uris,
        }
    }

    #[test]
    fn test_primary_url_prefers_always_visible() {
        let repo = repository(vec![
            uri("ssh://host/hidden.git", "never"),
            uri("https://host/visible.git", "always"),
        ]);
        assert_eq!(repo.primary_url(), Some("https://host/visible.git"));
    }

    #[test]
    fn test_primary_url_falls_back_to_first() {
        let repo = repository(vec![
            uri("ssh://host/a.git", "never"),
            uri("https://host/b.git", "hidden"),
        ]);
        assert_eq!(repo.primary_url(), Some("ssh://host/a.git"));
    }

    #[test]
    fn test_primary_url_without_uris() {
        assert_eq!(repository(Vec::new()).primary_url(), None);
    }

    #[test]
    fn test_vcs_kind_keeps_unknown_tags() {
        assert_eq!(VcsKind::from("git".to_string()), VcsKind::Git);
        assert_eq!(VcsKind::from("hg".to_string()), VcsKind::Mercurial);
        let other = VcsKind::from("darcs".to_string());
        assert_eq!(other, VcsKind::Other("darcs".to_string()));
        assert_eq!(other.to_string(), "darcs");
    }
}
