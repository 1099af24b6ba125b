use crate::staging::resolve_staged_diff;
use crate::transport::{map_malformed, ConduitError, ConduitTransport};
use crate::types::{Branch, Repository, RepositoryUri, StagedDiff, VcsKind};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

const REPOSITORY_SEARCH: &str = "diffusion.repository.search";
const BRANCH_QUERY: &str = "diffusion.branchquery";
const REVISION_SEARCH: &str = "differential.revision.search";
const QUERY_DIFFS: &str = "differential.querydiffs";
const PING: &str = "conduit.ping";

/// Revision statuses that can still receive new diffs.
pub const OPEN_REVISION_STATUSES: [&str; 5] = [
    "needs-revision",
    "needs-review",
    "changes-planned",
    "published",
    "draft",
];

#[derive(Debug, Deserialize)]
struct SearchResult<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RepositoryRow {
    phid: String,
    fields: RepositoryFields,
    #[serde(default)]
    attachments: RepositoryAttachments,
}

#[derive(Debug, Deserialize)]
struct RepositoryFields {
    name: String,
    vcs: String,
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryAttachments {
    uris: Option<UriAttachment>,
}

#[derive(Debug, Deserialize)]
struct UriAttachment {
    #[serde(default)]
    uris: Vec<UriRow>,
}

#[derive(Debug, Deserialize)]
struct UriRow {
    fields: UriFields,
}

#[derive(Debug, Deserialize)]
struct UriFields {
    uri: Effective,
    display: Effective,
}

#[derive(Debug, Deserialize)]
struct Effective {
    effective: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BranchRow {
    short_name: String,
    commit_identifier: String,
    raw_fields: BranchRawFields,
}

#[derive(Debug, Deserialize)]
struct BranchRawFields {
    epoch: i64,
}

#[derive(Debug, Deserialize)]
struct RevisionRow {
    id: u64,
    #[serde(default)]
    fields: RevisionFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevisionFields {
    #[serde(default)]
    title: String,
    #[serde(default)]
    date_created: i64,
}

impl From<RepositoryRow> for Repository {
    fn from(row: RepositoryRow) -> Self {
        let uris = row
            .attachments
            .uris
            .map(|attachment| attachment.uris)
            .unwrap_or_default()
            .into_iter()
            .map(|uri| RepositoryUri {
                uri: uri.fields.uri.effective,
                display: uri.fields.display.effective,
            })
            .collect();
        Repository {
            phid: row.phid,
            name: row.fields.name,
            vcs: VcsKind::from(row.fields.vcs),
            uris,
        }
    }
}

/// Typed queries against the Diffusion and Differential applications.
pub struct DiffusionClient<'a, T: ConduitTransport> {
    conduit: &'a T,
}

impl<'a, T: ConduitTransport> DiffusionClient<'a, T> {
    pub fn new(conduit: &'a T) -> Self {
        Self { conduit }
    }

    /// Performs `method`, turning an `error_code` in the response envelope
    /// into a protocol error.
    fn call(&self, method: &str, params: Value) -> Result<Value, ConduitError> {
        let response = self.conduit.perform(method, params)?;
        match response.get("error_code") {
            None | Some(Value::Null) => Ok(response),
            Some(code) => Err(ConduitError::Protocol {
                code: code.as_str().map_or_else(|| code.to_string(), str::to_string),
                message: response
                    .get("error_info")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
        }
    }

    pub fn ping(&self) -> Result<(), ConduitError> {
        self.call(PING, json!({}))?;
        Ok(())
    }

    pub fn active_repositories(&self) -> Result<Vec<Repository>, ConduitError> {
        let params = json!({
            "order": "name",
            "queryKey": "active",
            "attachments": {"uris": true},
        });
        let response = self.call(REPOSITORY_SEARCH, params)?;
        repositories_from_response(response)
    }

    /// Looks up one repository by PHID. `None` when the server knows no such
    /// repository.
    pub fn repository(&self, phid: &str) -> Result<Option<Repository>, ConduitError> {
        let params = json!({
            "constraints": {"phids": [phid]},
            "attachments": {"uris": true},
        });
        let response = self.call(REPOSITORY_SEARCH, params)?;
        Ok(repositories_from_response(response)?.into_iter().next())
    }

    pub fn open_branches(&self, repository: &str) -> Result<Vec<Branch>, ConduitError> {
        let params = json!({
            "closed": false,
            "repository": repository,
        });
        let response = self.call(BRANCH_QUERY, params)?;
        let Some(result) = take_result(response) else {
            return Ok(Vec::new());
        };
        let rows: Vec<BranchRow> = decode(BRANCH_QUERY, result)?;
        Ok(rows
            .into_iter()
            .map(|row| Branch {
                name: row.short_name,
                commit: row.commit_identifier,
                last_modified: epoch(row.raw_fields.epoch),
            })
            .collect())
    }

    /// Returns the staged reference of every open revision of `repository`
    /// that has one, in the order the server lists the revisions.
    pub fn open_revisions(&self, repository: &str) -> Result<Vec<StagedDiff>, ConduitError> {
        self.open_revisions_within(repository, |_| true)
    }

    /// Like [`Self::open_revisions`], but only looks up the diffs of
    /// revisions whose id `wanted` accepts.
    pub fn open_revisions_within(
        &self,
        repository: &str,
        wanted: impl Fn(u64) -> bool,
    ) -> Result<Vec<StagedDiff>, ConduitError> {
        let params = json!({
            "constraints": {
                "repositoryPHIDs": [repository],
                "statuses": OPEN_REVISION_STATUSES,
            },
        });
        let response = self.call(REVISION_SEARCH, params)?;
        let Some(result) = take_result(response) else {
            return Ok(Vec::new());
        };
        let revisions: SearchResult<RevisionRow> = decode(REVISION_SEARCH, result)?;
        debug!(
            repository,
            count = revisions.data.len(),
            "found open revisions"
        );

        let mut staged = Vec::new();
        for revision in revisions.data {
            if !wanted(revision.id) {
                debug!(revision = revision.id, "revision outside requested scope");
                continue;
            }
            let diffs = match self.revision_diffs(revision.id) {
                Ok(diffs) => diffs,
                Err(err) => {
                    warn!(revision = revision.id, error = %err, "diff lookup failed");
                    continue;
                }
            };
            debug!(
                revision = revision.id,
                title = %revision.fields.title,
                diffs = diffs.len(),
                "checking revision"
            );
            let created = epoch(revision.fields.date_created);
            if let Some(found) = resolve_staged_diff(revision.id, created, &diffs) {
                staged.push(found);
            }
        }
        Ok(staged)
    }

    /// All diffs of a revision keyed by diff id, in server order.
    pub fn revision_diffs(&self, revision_id: u64) -> Result<Vec<(String, Value)>, ConduitError> {
        let params = json!({"revisionIDs": [revision_id]});
        let response = self.call(QUERY_DIFFS, params)?;
        let diffs = match take_result(response) {
            None => Vec::new(),
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(index, diff)| {
                    let id = diff
                        .get("id")
                        .map(|id| match id {
                            Value::String(id) => id.clone(),
                            other => other.to_string(),
                        })
                        .unwrap_or_else(|| index.to_string());
                    (id, diff)
                })
                .collect(),
            Some(other) => {
                return Err(ConduitError::Malformed {
                    method: QUERY_DIFFS.to_string(),
                    reason: format!("unexpected result: {other}"),
                })
            }
        };
        Ok(diffs)
    }
}

fn repositories_from_response(response: Value) -> Result<Vec<Repository>, ConduitError> {
    let Some(result) = take_result(response) else {
        return Ok(Vec::new());
    };
    let rows: SearchResult<RepositoryRow> = decode(REPOSITORY_SEARCH, result)?;
    Ok(rows.data.into_iter().map(Repository::from).collect())
}

fn take_result(response: Value) -> Option<Value> {
    match response {
        Value::Object(mut map) => map.remove("result").filter(|result| !result.is_null()),
        _ => None,
    }
}

fn decode<D: DeserializeOwned>(method: &'static str, value: Value) -> Result<D, ConduitError> {
    serde_json::from_value(value).map_err(map_malformed(method))
}

fn epoch(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}
