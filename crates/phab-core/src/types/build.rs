use glob::Pattern;
use serde::{Deserialize, Serialize};

/// How much of the repository a branch build fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Only the built branch.
    #[default]
    Branch,
    /// Every branch of the remote.
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub name: String,
    pub refspec: String,
    pub credentials_id: Option<String>,
}

/// A branch selector handed to the checkout engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchSpec(String);

impl BranchSpec {
    pub fn new(spec: impl Into<String>) -> Self {
        Self(spec.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the selector picks `branch`. Refspec selectors are matched on
    /// their source side (`refs/heads/...`) as glob patterns. A selector
    /// that is not a valid pattern only matches literally.
    pub fn matches(&self, branch: &str) -> bool {
        let source = self.0.trim_start_matches('+');
        let source = source.split_once(':').map_or(source, |(src, _)| src);
        let candidates = [
            branch.to_string(),
            format!("refs/heads/{branch}"),
            format!("refs/tags/{branch}"),
        ];
        match Pattern::new(source) {
            Ok(pattern) => candidates.iter().any(|candidate| pattern.matches(candidate)),
            Err(_) => candidates.iter().any(|candidate| candidate == source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildChooser {
    /// Build the tip of the selected branch.
    Default,
    /// Build exactly this commit.
    SpecificRevision { hash: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScmExtension {
    BuildChooser { chooser: BuildChooser },
    /// Compute the changelog against `remote/target` instead of the previous
    /// build.
    ChangelogToBranch { remote: String, target: String },
}

/// Everything the checkout engine needs to fetch and check out one head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmConfig {
    pub remotes: Vec<RemoteConfig>,
    pub branches: Vec<BranchSpec>,
    pub extensions: Vec<ScmExtension>,
}

impl ScmConfig {
    pub fn build_chooser(&self) -> Option<&BuildChooser> {
        self.extensions.iter().find_map(|extension| match extension {
            ScmExtension::BuildChooser { chooser } => Some(chooser),
            ScmExtension::ChangelogToBranch { .. } => None,
        })
    }
}
