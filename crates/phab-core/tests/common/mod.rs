#![allow(dead_code)]

use phab_conduit::{ConduitError, ConduitTransport};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing_subscriber::{fmt, EnvFilter};

pub const REPOSITORY: &str = "PHID-REPO-app";
pub const CLONE_URL: &str = "https://phab.example.com/source/app.git";

pub fn init_test_logging() {
    let _ = fmt()
        .with_test_writer()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("phab_core=debug".parse().unwrap())
                .add_directive("phab_conduit=debug".parse().unwrap()),
        )
        .try_init();
}

/// A Conduit server answering from canned responses.
pub struct ScriptedConduit {
    repositories: Value,
    branches: Value,
    revisions: Value,
    diffs: HashMap<u64, Value>,
    pub calls: RefCell<Vec<(String, Value)>>,
}

impl ScriptedConduit {
    /// One repository with branch `main@abc123` and revision D42 staged as
    /// `phabricator/diff/99@def456` on top of `origin/main`.
    pub fn app() -> Self {
        let mut diffs = HashMap::new();
        diffs.insert(
            42,
            json!({"result": {
                "99": {"id": "99", "properties": {"arc.staging": {
                    "status": "pushed",
                    "refs": [
                        {"type": "base", "ref": "origin/main", "commit": "abc123"},
                        {"type": "diff", "ref": "phabricator/diff/99", "commit": "def456",
                         "remote": {"uri": CLONE_URL}}
                    ]
                }}},
                "98": {"id": "98", "properties": []}
            }}),
        );
        Self {
            repositories: json!({"result": {"data": [{
                "phid": REPOSITORY,
                "fields": {"name": "app", "vcs": "git"},
                "attachments": {"uris": {"uris": [
                    {"fields": {
                        "uri": {"effective": "ssh://git@phab.example.com/source/app.git"},
                        "display": {"effective": "never"}
                    }},
                    {"fields": {
                        "uri": {"effective": CLONE_URL},
                        "display": {"effective": "always"}
                    }}
                ]}}
            }]}}),
            branches: json!({"result": [
                {"shortName": "main", "commitIdentifier": "abc123",
                 "rawFields": {"epoch": 1_700_000_000}}
            ]}),
            revisions: json!({"result": {"data": [
                {"id": 42, "fields": {"title": "Add widgets", "dateCreated": 1_700_000_500}}
            ]}}),
            diffs,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn without_repository(mut self) -> Self {
        self.repositories = json!({"result": {"data": []}});
        self
    }

    pub fn with_branches(mut self, branches: Value) -> Self {
        self.branches = branches;
        self
    }

    /// Adds an open revision listed after D42 with a staged diff of its own.
    pub fn with_revision(mut self, id: u64) -> Self {
        if let Some(rows) = self.revisions["result"]["data"].as_array_mut() {
            rows.push(json!({"id": id, "fields": {"title": "More", "dateCreated": 1_700_000_600}}));
        }
        self.diffs.insert(
            id,
            json!({"result": {
                "1": {"id": "1", "properties": {"arc.staging": {
                    "status": "pushed",
                    "refs": [
                        {"type": "base", "ref": "origin/main", "commit": "abc123"},
                        {"type": "diff", "ref": format!("phabricator/diff/{id}"),
                         "commit": format!("{id:06}"), "remote": {"uri": CLONE_URL}}
                    ]
                }}}
            }}),
        );
        self
    }

    pub fn called(&self, method: &str) -> bool {
        self.calls.borrow().iter().any(|(called, _)| called == method)
    }

    /// Revision ids whose diffs were looked up, in call order.
    pub fn diff_lookups(&self) -> Vec<u64> {
        self.calls
            .borrow()
            .iter()
            .filter(|(method, _)| method == "differential.querydiffs")
            .filter_map(|(_, params)| params["revisionIDs"][0].as_u64())
            .collect()
    }
}

impl ConduitTransport for ScriptedConduit {
    fn perform(&self, method: &str, params: Value) -> Result<Value, ConduitError> {
        self.calls
            .borrow_mut()
            .push((method.to_string(), params.clone()));
        match method {
            "diffusion.repository.search" => Ok(self.repositories.clone()),
            "diffusion.branchquery" => Ok(self.branches.clone()),
            "differential.revision.search" => Ok(self.revisions.clone()),
            "differential.querydiffs" => {
                let id = params["revisionIDs"][0].as_u64().unwrap_or_default();
                Ok(self
                    .diffs
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| json!({"result": []})))
            }
            other => Err(ConduitError::Protocol {
                code: "ERR-CONDUIT-CALL".to_string(),
                message: format!("unknown method {other}"),
            }),
        }
    }
}
