use crate::types::{DifferentialHead, Head};
use serde::{Deserialize, Serialize};

/// Splits a job listing into branch jobs and revision jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewFilter {
    BranchJobsOnly,
    RevisionJobsOnly,
}

impl ViewFilter {
    pub fn display_name(&self) -> &'static str {
        match self {
            ViewFilter::BranchJobsOnly => "Phabricator Branch Jobs Only",
            ViewFilter::RevisionJobsOnly => "Phabricator Pull Requests Only",
        }
    }

    /// Only Differential heads are ever shown; plain branch heads are not.
    pub fn should_show(&self, head: &Head) -> bool {
        match head {
            Head::Branch(_) => false,
            Head::Differential(differential) => self.accepts(differential),
        }
    }

    fn accepts(&self, head: &DifferentialHead) -> bool {
        match self {
            ViewFilter::BranchJobsOnly => head.revision_id().is_none(),
            ViewFilter::RevisionJobsOnly => head.revision_id().is_some(),
        }
    }

    /// Appends to `added` every item of `all`, in order, that is not already
    /// there and whose head passes this filter.
    pub fn filter<I, F>(&self, mut added: Vec<I>, all: &[I], head_of: F) -> Vec<I>
    where
        I: Clone + PartialEq,
        F: Fn(&I) -> Option<Head>,
    {
        for item in all {
            if added.contains(item) {
                continue;
            }
            if head_of(item).is_some_and(|head| self.should_show(&head)) {
                added.push(item.clone());
            }
        }
        added
    }
}
