//! Per-retrieval state: which kinds of heads to discover, which heads the
//! observer is limited to, and the lazily fetched candidates.

use crate::error::SourceError;
use crate::observer::{Criteria, HeadObserver, Probe};
use crate::types::{Head, HeadCategory, HeadInfo, Revision};
use chrono::{DateTime, Utc};
use phab_conduit::{Branch, ConduitError, StagedDiff};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use tracing::{debug, warn};

/// A switch enabling discovery of one kind of head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryTrait {
    BranchDiscovery,
    RevisionDiscovery,
}

impl DiscoveryTrait {
    pub fn decorate(&self, context: &mut DiscoveryContext<'_>) {
        match self {
            DiscoveryTrait::BranchDiscovery => context.want_branches(true),
            DiscoveryTrait::RevisionDiscovery => context.want_revisions(true),
        };
    }

    pub fn include_category(&self, category: HeadCategory) -> bool {
        match self {
            DiscoveryTrait::BranchDiscovery => category == HeadCategory::Uncategorized,
            DiscoveryTrait::RevisionDiscovery => category == HeadCategory::ChangeRequests,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DiscoveryTrait::BranchDiscovery => "Discover branches",
            DiscoveryTrait::RevisionDiscovery => "Discover Differential revisions",
        }
    }
}

pub struct DiscoveryContext<'a> {
    criteria: Option<&'a dyn Criteria>,
    observer: &'a mut dyn HeadObserver,
    want_branches: bool,
    want_revisions: bool,
}

impl<'a> DiscoveryContext<'a> {
    pub fn new(criteria: Option<&'a dyn Criteria>, observer: &'a mut dyn HeadObserver) -> Self {
        Self {
            criteria,
            observer,
            want_branches: false,
            want_revisions: false,
        }
    }

    /// Adds the requirement for branches. `false` leaves it as is.
    pub fn want_branches(&mut self, include: bool) -> &mut Self {
        self.want_branches |= include;
        self
    }

    /// Adds the requirement for revisions. `false` leaves it as is.
    pub fn want_revisions(&mut self, include: bool) -> &mut Self {
        self.want_revisions |= include;
        self
    }

    pub fn wants_branches(&self) -> bool {
        self.want_branches
    }

    pub fn wants_revisions(&self) -> bool {
        self.want_revisions
    }

    pub fn with_traits(mut self, traits: &[DiscoveryTrait]) -> Self {
        for discovery in traits {
            discovery.decorate(&mut self);
        }
        self
    }

    pub fn new_request(
        self,
        repository: impl Into<String>,
        listener: &'a mut dyn Write,
    ) -> SourceRequest<'a> {
        let (requested_branch_names, requested_revision_numbers) =
            match self.observer.includes() {
                Some(includes) => {
                    let (branches, revisions) = requested_scope(&includes);
                    (Some(branches), Some(revisions))
                }
                None => (None, None),
            };
        SourceRequest {
            fetch_branches: self.want_branches,
            fetch_revisions: self.want_revisions,
            requested_branch_names,
            requested_revision_numbers,
            repository: repository.into(),
            branches: OnceCell::new(),
            revisions: OnceCell::new(),
            criteria: self.criteria,
            observer: RefCell::new(self.observer),
            listener: RefCell::new(listener),
            complete: Cell::new(false),
        }
    }
}

fn requested_scope(includes: &HashSet<Head>) -> (HashSet<String>, HashSet<String>) {
    let mut branch_names = HashSet::with_capacity(includes.len());
    let mut revision_numbers = HashSet::with_capacity(includes.len());
    for head in includes {
        match head {
            Head::Branch(branch) => {
                branch_names.insert(branch.name().to_string());
            }
            Head::Differential(differential) => {
                if let Some(id) = differential.revision_id() {
                    revision_numbers.insert(id.to_string());
                }
                branch_names.insert(differential.name().to_string());
            }
        }
    }
    (branch_names, revision_numbers)
}

type Fetch<'a, T> = Box<dyn FnOnce() -> Result<Vec<T>, ConduitError> + 'a>;

/// Candidates fetched on first access and cached afterwards.
pub struct LazyCandidates<'a, T> {
    fetch: Cell<Option<Fetch<'a, T>>>,
    fetched: OnceCell<Vec<T>>,
}

impl<'a, T> LazyCandidates<'a, T> {
    pub fn new(fetch: impl FnOnce() -> Result<Vec<T>, ConduitError> + 'a) -> Self {
        Self {
            fetch: Cell::new(Some(Box::new(fetch))),
            fetched: OnceCell::new(),
        }
    }

    pub fn is_fetched(&self) -> bool {
        self.fetched.get().is_some()
    }

    /// Runs the fetch on first call. A failed fetch reads as empty.
    pub fn get(&self, on_error: impl FnOnce(&ConduitError)) -> &[T] {
        self.fetched.get_or_init(|| match self.fetch.take() {
            Some(fetch) => fetch().unwrap_or_else(|err| {
                on_error(&err);
                Vec::new()
            }),
            None => Vec::new(),
        })
    }
}

/// One retrieval in progress. Dropping it releases the candidate sources.
pub struct SourceRequest<'a> {
    fetch_branches: bool,
    fetch_revisions: bool,
    requested_branch_names: Option<HashSet<String>>,
    requested_revision_numbers: Option<HashSet<String>>,
    repository: String,
    branches: OnceCell<LazyCandidates<'a, Branch>>,
    revisions: OnceCell<LazyCandidates<'a, StagedDiff>>,
    criteria: Option<&'a dyn Criteria>,
    observer: RefCell<&'a mut dyn HeadObserver>,
    listener: RefCell<&'a mut dyn Write>,
    complete: Cell<bool>,
}

impl<'a> SourceRequest<'a> {
    pub fn is_fetch_branches(&self) -> bool {
        self.fetch_branches
    }

    pub fn is_fetch_revisions(&self) -> bool {
        self.fetch_revisions
    }

    /// `None` when the request is not scoped to a subset of branches.
    pub fn requested_branch_names(&self) -> Option<&HashSet<String>> {
        self.requested_branch_names.as_ref()
    }

    /// `None` when the request is not scoped to a subset of revisions.
    pub fn requested_revision_numbers(&self) -> Option<&HashSet<String>> {
        self.requested_revision_numbers.as_ref()
    }

    pub fn is_branch_requested(&self, name: &str) -> bool {
        self.requested_branch_names
            .as_ref()
            .is_none_or(|names| names.contains(name))
    }

    pub fn is_revision_requested(&self, revision_id: u64) -> bool {
        self.requested_revision_numbers
            .as_ref()
            .is_none_or(|numbers| numbers.contains(&revision_id.to_string()))
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn set_branches(
        &self,
        fetch: impl FnOnce() -> Result<Vec<Branch>, ConduitError> + 'a,
    ) -> Result<(), SourceError> {
        self.branches
            .set(LazyCandidates::new(fetch))
            .map_err(|_| SourceError::CandidatesAlreadySet { kind: "branch" })
    }

    pub fn set_revisions(
        &self,
        fetch: impl FnOnce() -> Result<Vec<StagedDiff>, ConduitError> + 'a,
    ) -> Result<(), SourceError> {
        self.revisions
            .set(LazyCandidates::new(fetch))
            .map_err(|_| SourceError::CandidatesAlreadySet { kind: "revision" })
    }

    /// The open branches, or nothing if no branch source was attached.
    pub fn branches(&self) -> &[Branch] {
        match self.branches.get() {
            Some(candidates) => candidates.get(|err| {
                warn!(repository = %self.repository, error = %err, "branch lookup failed");
                self.log(format_args!("Error: {err}"));
            }),
            None => &[],
        }
    }

    /// The staged revisions, or nothing if no revision source was attached.
    pub fn revisions(&self) -> &[StagedDiff] {
        match self.revisions.get() {
            Some(candidates) => candidates.get(|err| {
                warn!(repository = %self.repository, error = %err, "revision lookup failed");
                self.log(format_args!("Error: {err}"));
            }),
            None => &[],
        }
    }

    /// Whether the observer needs nothing more. Once true, stays true.
    pub fn is_complete(&self) -> bool {
        if !self.complete.get() && !self.observer.borrow().is_observing() {
            self.complete.set(true);
        }
        self.complete.get()
    }

    /// Appends a line to the retrieval log.
    pub fn log(&self, line: fmt::Arguments<'_>) {
        let mut listener = self.listener.borrow_mut();
        let written = listener
            .write_fmt(line)
            .and_then(|()| listener.write_all(b"\n"));
        if let Err(err) = written {
            warn!(repository = %self.repository, error = %err, "listener write failed");
        }
    }

    /// Evaluates one candidate head and reports it to the observer if it
    /// meets the criteria. Returns `true` once the observer needs nothing
    /// more; a complete request reports nothing further.
    pub fn process(
        &self,
        head: Head,
        hash: Option<&str>,
        last_modified: Option<DateTime<Utc>>,
    ) -> bool {
        if self.is_complete() {
            return true;
        }
        let Some(hash) = hash else {
            self.record(&head, Witness::Skipped);
            return self.is_complete();
        };
        let probe = Probe {
            name: head.name().to_string(),
            last_modified,
        };
        let matches = self
            .criteria
            .is_none_or(|criteria| criteria.is_head(&probe));
        if !matches {
            self.record(&head, Witness::DoesNotMeetCriteria);
            return self.is_complete();
        }
        self.record(&head, Witness::MetCriteria);

        let revision = Revision::new(head.clone(), hash);
        self.observer.borrow_mut().observe(head, revision);
        self.is_complete()
    }

    fn record(&self, head: &Head, witness: Witness) {
        debug!(head = %head.name(), outcome = %witness, "criteria evaluated");
        self.log(format_args!("    {witness}"));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Witness {
    Skipped,
    MetCriteria,
    DoesNotMeetCriteria,
}

impl fmt::Display for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Witness::Skipped => f.write_str("Skipped"),
            Witness::MetCriteria => f.write_str("Met criteria"),
            Witness::DoesNotMeetCriteria => f.write_str("Does not meet criteria"),
        }
    }
}
