use crate::error::SourceError;
use crate::types::{
    BranchSpec, BuildChooser, FetchMode, Head, HeadInfo, RemoteConfig, Revision, ScmConfig,
    ScmExtension,
};

pub const REMOTE_NAME: &str = "origin";
pub const ALL_BRANCHES_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";
pub const STAGING_TAGS_REFSPEC: &str =
    "+refs/tags/phabricator/*:refs/remotes/origin/tags/phabricator/*";

pub fn branch_refspec(name: &str) -> String {
    format!("+refs/heads/{name}:refs/remotes/{REMOTE_NAME}/{name}")
}

pub fn remote_configs(
    head: &Head,
    mode: FetchMode,
    credentials_id: Option<&str>,
) -> Result<Vec<RemoteConfig>, SourceError> {
    if head.repo_url().is_empty() {
        return Err(SourceError::UnsupportedHead {
            name: head.name().to_string(),
        });
    }
    let refspec = match head {
        Head::Branch(branch) => match mode {
            FetchMode::Branch => branch_refspec(branch.name()),
            FetchMode::Wildcard => ALL_BRANCHES_REFSPEC.to_string(),
        },
        Head::Differential(_) => STAGING_TAGS_REFSPEC.to_string(),
    };
    Ok(vec![RemoteConfig {
        url: head.repo_url().to_string(),
        name: REMOTE_NAME.to_string(),
        refspec,
        credentials_id: credentials_id.map(str::to_string),
    }])
}

/// Fetch and checkout settings for `head`. With a `revision`, the checkout
/// is pinned to its commit instead of the branch tip.
pub fn scm_config(
    head: &Head,
    revision: Option<&Revision>,
    mode: FetchMode,
    credentials_id: Option<&str>,
) -> Result<ScmConfig, SourceError> {
    let remotes = remote_configs(head, mode, credentials_id)?;
    let chooser = match revision {
        Some(revision) => BuildChooser::SpecificRevision {
            hash: revision.hash.clone(),
        },
        None => BuildChooser::Default,
    };
    let mut extensions = vec![ScmExtension::BuildChooser { chooser }];

    let branches = match head {
        Head::Branch(_) => vec![BranchSpec::new(ALL_BRANCHES_REFSPEC)],
        Head::Differential(differential) => {
            extensions.push(ScmExtension::ChangelogToBranch {
                remote: differential.base_remote().to_string(),
                target: differential.base_target().to_string(),
            });
            vec![BranchSpec::new(differential.tag_name())]
        }
    };

    Ok(ScmConfig {
        remotes,
        branches,
        extensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BranchHead, DifferentialHead};

    fn feature_x() -> Head {
        BranchHead::new("feature-x", "https://host/repo.git").into()
    }

    fn d42() -> Head {
        DifferentialHead::new(
            "https://host/repo.git",
            "phabricator/diff/99",
            "origin/main",
            Some(42),
        )
        .unwrap()
        .into()
    }

    #[test]
    fn test_branch_head_fetches_only_its_branch() {
        let config = scm_config(&feature_x(), None, FetchMode::Branch, Some("git-ssh")).unwrap();
        assert_eq!(
            config.remotes,
            vec![RemoteConfig {
                url: "https://host/repo.git".to_string(),
                name: "origin".to_string(),
                refspec: "+refs/heads/feature-x:refs/remotes/origin/feature-x".to_string(),
                credentials_id: Some("git-ssh".to_string()),
            }]
        );
        assert_eq!(config.branches, vec![BranchSpec::new(ALL_BRANCHES_REFSPEC)]);
        assert!(config.branches[0].matches("feature-x"));
        assert_eq!(config.build_chooser(), Some(&BuildChooser::Default));
        assert_eq!(config.extensions.len(), 1);
    }

    #[test]
    fn test_branch_head_wildcard_mode() {
        let remotes = remote_configs(&feature_x(), FetchMode::Wildcard, None).unwrap();
        assert_eq!(remotes[0].refspec, ALL_BRANCHES_REFSPEC);
        assert_eq!(remotes[0].credentials_id, None);
    }

    #[test]
    fn test_revision_pins_chooser() {
        let head = feature_x();
        let revision = Revision::new(head.clone(), "abc123");
        let config = scm_config(&head, Some(&revision), FetchMode::Branch, None).unwrap();
        assert_eq!(
            config.build_chooser(),
            Some(&BuildChooser::SpecificRevision {
                hash: "abc123".to_string()
            })
        );
    }

    #[test]
    fn test_differential_head_fetches_staging_tags() {
        let head = d42();
        let revision = Revision::new(head.clone(), "def456");
        let config = scm_config(&head, Some(&revision), FetchMode::Branch, Some("git-ssh")).unwrap();
        assert_eq!(config.remotes[0].refspec, STAGING_TAGS_REFSPEC);
        assert_eq!(config.remotes[0].url, "https://host/repo.git");
        assert_eq!(config.branches, vec![BranchSpec::new("phabricator/diff/99")]);
        assert_eq!(
            config.extensions,
            vec![
                ScmExtension::BuildChooser {
                    chooser: BuildChooser::SpecificRevision {
                        hash: "def456".to_string()
                    }
                },
                ScmExtension::ChangelogToBranch {
                    remote: "origin".to_string(),
                    target: "main".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_head_without_url_is_unsupported() {
        let head: Head = BranchHead::new("main", "").into();
        let err = scm_config(&head, None, FetchMode::Branch, None).unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedHead { name } if name == "main"));
    }
}
