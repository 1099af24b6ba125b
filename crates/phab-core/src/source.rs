use crate::build::scm_config;
use crate::config::SourceConfig;
use crate::context::{DiscoveryContext, DiscoveryTrait, SourceRequest};
use crate::error::SourceError;
use crate::observer::{Criteria, HeadObserver, Interrupt};
use crate::types::{BranchHead, DifferentialHead, Head, HeadCategory, Revision, ScmConfig};
use phab_conduit::{ConduitTransport, DiffusionClient};
use std::io::Write;
use tracing::{debug, info, info_span, warn};

/// Discovers the branches and staged Differential revisions of one
/// Diffusion repository.
pub struct PhabricatorSource<T: ConduitTransport> {
    config: SourceConfig,
    conduit: T,
}

impl<T: ConduitTransport> PhabricatorSource<T> {
    pub fn new(config: SourceConfig, conduit: T) -> Self {
        Self { config, conduit }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn conduit(&self) -> &T {
        &self.conduit
    }

    pub fn traits(&self) -> &[DiscoveryTrait] {
        &self.config.traits
    }

    pub fn set_traits(&mut self, traits: Vec<DiscoveryTrait>) {
        self.config.traits = traits;
    }

    /// Head categories enabled by the configured traits.
    pub fn categories(&self) -> Vec<HeadCategory> {
        [HeadCategory::Uncategorized, HeadCategory::ChangeRequests]
            .into_iter()
            .filter(|category| {
                self.config
                    .traits
                    .iter()
                    .any(|discovery| discovery.include_category(*category))
            })
            .collect()
    }

    /// Reports every head that meets `criteria` to `observer`, branches
    /// first. Lookup failures are logged and leave that kind of head
    /// undiscovered; only an interrupt aborts the retrieval.
    pub fn retrieve(
        &self,
        criteria: Option<&dyn Criteria>,
        observer: &mut dyn HeadObserver,
        listener: &mut dyn Write,
        interrupt: &Interrupt,
    ) -> Result<(), SourceError> {
        let repository = self.config.repository.as_str();
        let span = info_span!("retrieve", repository);
        let _guard = span.enter();

        let request = DiscoveryContext::new(criteria, observer)
            .with_traits(&self.config.traits)
            .new_request(repository, listener);
        request.log(format_args!("Start retrieving now"));
        if let Some(url) = &self.config.server_url {
            request.log(format_args!("Connecting to {url}"));
        }

        if request.is_fetch_revisions() {
            let scope = request.requested_revision_numbers().cloned();
            request.set_revisions(move || {
                DiffusionClient::new(&self.conduit).open_revisions_within(repository, |id| {
                    scope
                        .as_ref()
                        .is_none_or(|numbers| numbers.contains(&id.to_string()))
                })
            })?;
        }
        if request.is_fetch_branches() {
            request.set_branches(|| DiffusionClient::new(&self.conduit).open_branches(repository))?;
        }

        if request.is_fetch_branches() && !request.is_complete() {
            self.retrieve_branches(&request, interrupt)?;
        }
        if request.is_fetch_revisions() && !request.is_complete() {
            self.retrieve_revisions(&request, interrupt)?;
        }
        request.log(format_args!("Done examining {repository}"));
        Ok(())
    }

    fn retrieve_branches(
        &self,
        request: &SourceRequest<'_>,
        interrupt: &Interrupt,
    ) -> Result<(), SourceError> {
        let repository = request.repository();
        request.log(format_args!("Looking up {repository} for branches"));

        let Some(url) = self.repository_url(request) else {
            return Ok(());
        };

        let mut count = 0;
        for branch in request.branches() {
            if request.is_complete() {
                request.log(format_args!("\n  {count} branches were processed (query completed)"));
                return Ok(());
            }
            if interrupt.is_raised() {
                return Err(SourceError::Interrupted);
            }
            if !request.is_branch_requested(&branch.name) {
                debug!(branch = %branch.name, "branch outside requested scope");
                continue;
            }
            request.log(format_args!("Checking branch {} from {repository}", branch.name));
            count += 1;

            let head = Head::from(BranchHead::new(branch.name.as_str(), url.as_str()));
            if request.process(head, Some(&branch.commit), Some(branch.last_modified)) {
                info!(count, "branch query completed early");
                request.log(format_args!("\n  {count} branches were processed (query completed)"));
                return Ok(());
            }
        }
        request.log(format_args!("\n  {count} branches were processed"));
        Ok(())
    }

    fn retrieve_revisions(
        &self,
        request: &SourceRequest<'_>,
        interrupt: &Interrupt,
    ) -> Result<(), SourceError> {
        let repository = request.repository();
        request.log(format_args!("Looking up {repository} for revisions"));

        let mut count = 0;
        for staged in request.revisions() {
            if request.is_complete() {
                request.log(format_args!("\n  {count} revisions were processed (query completed)"));
                return Ok(());
            }
            if interrupt.is_raised() {
                return Err(SourceError::Interrupted);
            }
            if !request.is_revision_requested(staged.revision_id) {
                debug!(revision = staged.revision_id, "revision outside requested scope");
                continue;
            }
            request.log(format_args!(
                "Checking revision D{} from {repository}",
                staged.revision_id
            ));
            count += 1;

            let head = match DifferentialHead::from_staged(staged) {
                Ok(head) => Head::from(head),
                Err(err) => {
                    warn!(revision = staged.revision_id, error = %err, "unusable staged diff");
                    request.log(format_args!("    Skipped: {err}"));
                    continue;
                }
            };
            if request.process(head, Some(&staged.commit), Some(staged.revision_created)) {
                info!(count, "revision query completed early");
                request.log(format_args!("\n  {count} revisions were processed (query completed)"));
                return Ok(());
            }
        }
        request.log(format_args!("\n  {count} revisions were processed"));
        Ok(())
    }

    fn repository_url(&self, request: &SourceRequest<'_>) -> Option<String> {
        let phid = request.repository();
        let found = DiffusionClient::new(&self.conduit)
            .repository(phid)
            .map_err(SourceError::from)
            .and_then(|repository| {
                repository.ok_or_else(|| SourceError::RepositoryNotFound {
                    phid: phid.to_string(),
                })
            });
        let repository = match found {
            Ok(repository) => repository,
            Err(err) => {
                warn!(repository = phid, error = %err, "repository lookup failed");
                request.log(format_args!("Error: {err}"));
                return None;
            }
        };
        match repository.primary_url() {
            Some(url) => {
                debug!(repository = phid, url, "resolved clone url");
                Some(url.to_string())
            }
            None => {
                warn!(repository = phid, "repository has no uris");
                request.log(format_args!("Error: repository {phid} has no clone uri"));
                None
            }
        }
    }

    /// Fetch and checkout settings for a discovered head.
    pub fn build(&self, head: &Head, revision: Option<&Revision>) -> Result<ScmConfig, SourceError> {
        scm_config(
            head,
            revision,
            self.config.fetch_mode,
            self.config.repo_credentials_id.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BuildChooser, FetchMode};
    use phab_conduit::ConduitError;
    use serde_json::Value;

    fn offline(_: &str, _: Value) -> Result<Value, ConduitError> {
        Err(ConduitError::Transport {
            reason: "offline".to_string(),
        })
    }

    #[test]
    fn test_categories_follow_traits() {
        let mut source = PhabricatorSource::new(SourceConfig::new("id", "PHID-REPO-1"), offline);
        assert_eq!(
            source.categories(),
            vec![HeadCategory::Uncategorized, HeadCategory::ChangeRequests]
        );
        source.set_traits(vec![DiscoveryTrait::RevisionDiscovery]);
        assert_eq!(source.traits(), &[DiscoveryTrait::RevisionDiscovery]);
        assert_eq!(source.categories(), vec![HeadCategory::ChangeRequests]);
        source.set_traits(Vec::new());
        assert!(source.categories().is_empty());
    }

    #[test]
    fn test_build_uses_configured_credentials_and_mode() {
        let mut config = SourceConfig::new("id", "PHID-REPO-1").with_repo_credentials_id(Some("git-ssh"));
        config.fetch_mode = FetchMode::Wildcard;
        let source = PhabricatorSource::new(config, offline);
        let head: Head = BranchHead::new("main", "https://host/r.git").into();
        let revision = Revision::new(head.clone(), "abc123");
        let built = source.build(&head, Some(&revision)).unwrap();
        assert_eq!(built.remotes[0].credentials_id.as_deref(), Some("git-ssh"));
        assert_eq!(built.remotes[0].refspec, "+refs/heads/*:refs/remotes/origin/*");
        assert_eq!(
            built.build_chooser(),
            Some(&BuildChooser::SpecificRevision {
                hash: "abc123".to_string()
            })
        );
    }

    #[test]
    fn test_unreachable_server_finds_nothing() {
        let source = PhabricatorSource::new(SourceConfig::new("id", "PHID-REPO-1"), offline);
        let mut observer = crate::observer::CollectObserver::new();
        let mut log = Vec::new();
        source
            .retrieve(None, &mut observer, &mut log, &Interrupt::new())
            .unwrap();
        assert!(observer.revisions().is_empty());
        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("Error: transport error: offline"));
        assert!(log.contains("0 revisions were processed"));
    }
}
