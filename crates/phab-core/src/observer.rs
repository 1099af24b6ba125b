use crate::types::{Head, Revision};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives the heads discovered by a retrieval.
pub trait HeadObserver {
    fn observe(&mut self, head: Head, revision: Revision);

    /// `false` once the observer has seen everything it wants.
    fn is_observing(&self) -> bool {
        true
    }

    /// The heads this observer is interested in, or `None` for all heads.
    fn includes(&self) -> Option<HashSet<Head>> {
        None
    }
}

/// What acceptance criteria can inspect about a head before it is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
}

pub trait Criteria {
    fn is_head(&self, probe: &Probe) -> bool;
}

impl<F> Criteria for F
where
    F: Fn(&Probe) -> bool,
{
    fn is_head(&self, probe: &Probe) -> bool {
        self(probe)
    }
}

/// Collects every observed revision, optionally limited to a set of heads.
#[derive(Debug, Default)]
pub struct CollectObserver {
    includes: Option<HashSet<Head>>,
    limit: Option<usize>,
    revisions: Vec<Revision>,
}

impl CollectObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn including(heads: impl IntoIterator<Item = Head>) -> Self {
        Self {
            includes: Some(heads.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Stops observing after `limit` revisions.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn into_revisions(self) -> Vec<Revision> {
        self.revisions
    }
}

impl HeadObserver for CollectObserver {
    fn observe(&mut self, head: Head, revision: Revision) {
        if let Some(includes) = &self.includes {
            if !includes.contains(&head) {
                return;
            }
        }
        self.revisions.push(revision);
    }

    fn is_observing(&self) -> bool {
        let limit_reached = self
            .limit
            .is_some_and(|limit| self.revisions.len() >= limit);
        let includes_seen = self.includes.as_ref().is_some_and(|includes| {
            includes
                .iter()
                .all(|head| self.revisions.iter().any(|revision| &revision.head == head))
        });
        !limit_reached && !includes_seen
    }

    fn includes(&self) -> Option<HashSet<Head>> {
        self.includes.clone()
    }
}

/// Cooperative cancellation flag shared between a retrieval and its caller.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
