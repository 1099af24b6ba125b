use crate::error::HeadError;
use phab_conduit::StagedDiff;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeadCategory {
    Uncategorized,
    ChangeRequests,
}

/// What every discoverable head exposes, whatever its variant.
pub trait HeadInfo {
    /// Unique name of the head within a source.
    fn name(&self) -> &str;

    fn pronoun(&self) -> Option<&'static str> {
        None
    }

    fn category(&self) -> HeadCategory;
}

/// An open branch of the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchHead {
    name: String,
    repo_url: String,
}

impl BranchHead {
    pub fn new(name: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo_url: repo_url.into(),
        }
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }
}

impl HeadInfo for BranchHead {
    fn name(&self) -> &str {
        &self.name
    }

    fn pronoun(&self) -> Option<&'static str> {
        Some("Branch")
    }

    fn category(&self) -> HeadCategory {
        HeadCategory::Uncategorized
    }
}

/// A staged Differential diff. With a revision id it stands for revision
/// `D<id>`; without one it is named after its staged branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifferentialHead {
    name: String,
    repo_url: String,
    branch_name: String,
    base_remote: String,
    base_target: String,
    revision_id: Option<u64>,
}

impl DifferentialHead {
    pub fn new(
        repo_url: impl Into<String>,
        branch_name: impl Into<String>,
        base_branch: &str,
        revision_id: Option<u64>,
    ) -> Result<Self, HeadError> {
        let branch_name = branch_name.into();
        let (base_remote, base_target) = split_base_branch(base_branch)?;
        Ok(Self {
            name: display_name(&branch_name, revision_id),
            repo_url: repo_url.into(),
            branch_name,
            base_remote,
            base_target,
            revision_id,
        })
    }

    pub fn from_staged(staged: &StagedDiff) -> Result<Self, HeadError> {
        Self::new(
            staged.remote_uri.as_str(),
            staged.ref_name.as_str(),
            &staged.base_ref,
            Some(staged.revision_id),
        )
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn branch_name(&self) -> &str {
        &self.branch_name
    }

    /// The staged ref is pushed as a tag under `refs/tags/phabricator/`.
    pub fn tag_name(&self) -> &str {
        &self.branch_name
    }

    pub fn base_remote(&self) -> &str {
        &self.base_remote
    }

    pub fn base_target(&self) -> &str {
        &self.base_target
    }

    pub fn revision_id(&self) -> Option<u64> {
        self.revision_id
    }
}

impl HeadInfo for DifferentialHead {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> HeadCategory {
        HeadCategory::ChangeRequests
    }
}

/// A discoverable unit of the source. Heads of the same variant compare
/// equal when their names match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Head {
    Branch(BranchHead),
    Differential(DifferentialHead),
}

impl Head {
    pub fn repo_url(&self) -> &str {
        match self {
            Head::Branch(head) => head.repo_url(),
            Head::Differential(head) => head.repo_url(),
        }
    }

    pub fn as_differential(&self) -> Option<&DifferentialHead> {
        match self {
            Head::Differential(head) => Some(head),
            Head::Branch(_) => None,
        }
    }
}

impl HeadInfo for Head {
    fn name(&self) -> &str {
        match self {
            Head::Branch(head) => head.name(),
            Head::Differential(head) => head.name(),
        }
    }

    fn pronoun(&self) -> Option<&'static str> {
        match self {
            Head::Branch(head) => head.pronoun(),
            Head::Differential(head) => head.pronoun(),
        }
    }

    fn category(&self) -> HeadCategory {
        match self {
            Head::Branch(head) => head.category(),
            Head::Differential(head) => head.category(),
        }
    }
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self.name() == other.name()
    }
}

impl Eq for Head {}

impl Hash for Head {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        self.name().hash(state);
    }
}

impl fmt::Display for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pronoun() {
            Some(pronoun) => write!(f, "{pronoun} {}", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

impl From<BranchHead> for Head {
    fn from(head: BranchHead) -> Self {
        Head::Branch(head)
    }
}

impl From<DifferentialHead> for Head {
    fn from(head: DifferentialHead) -> Self {
        Head::Differential(head)
    }
}

/// A head resolved to a concrete commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision {
    pub head: Head,
    pub hash: String,
}

impl Revision {
    pub fn new(head: Head, hash: impl Into<String>) -> Self {
        Self {
            head,
            hash: hash.into(),
        }
    }
}

/// Splits `remote/target` once on the first `/`.
pub fn split_base_branch(name: &str) -> Result<(String, String), HeadError> {
    name.split_once('/')
        .map(|(remote, target)| (remote.to_string(), target.to_string()))
        .ok_or_else(|| HeadError::MissingRemoteSeparator {
            name: name.to_string(),
        })
}

fn display_name(branch_name: &str, revision_id: Option<u64>) -> String {
    match revision_id {
        Some(id) => format!("D{id}"),
        None => branch_name.to_string(),
    }
}
