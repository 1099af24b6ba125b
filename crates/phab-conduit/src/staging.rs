//! Resolution of a Differential revision to the commit `arc` staged for it.
//!
//! `arc diff` records staging pushes in the `arc.staging` diff property:
//!
//! ```json
//! {"status": "pushed", "refs": [
//!     {"type": "base", "ref": "origin/master", "commit": "..."},
//!     {"type": "diff", "ref": "phabricator/diff/99", "commit": "...",
//!      "remote": {"uri": "https://host/repo.git"}}
//! ]}
//! ```

use crate::types::StagedDiff;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const STAGING_PROPERTY: &str = "arc.staging";
const STATUS_PUSHED: &str = "pushed";

#[derive(Debug, Deserialize)]
struct Staging {
    status: Option<String>,
    #[serde(default)]
    refs: Vec<StagedRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct StagedRef {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "ref")]
    name: Option<String>,
    commit: Option<String>,
    remote: Option<StagedRemote>,
}

#[derive(Debug, Clone, Deserialize)]
struct StagedRemote {
    uri: Option<String>,
}

/// Returns the staged reference of the first diff, in the given order, that
/// was pushed with both a `diff` and a `base` ref. Later diffs are not
/// inspected once one qualifies.
pub fn resolve_staged_diff(
    revision_id: u64,
    revision_created: DateTime<Utc>,
    diffs: &[(String, Value)],
) -> Option<StagedDiff> {
    diffs.iter().find_map(|(diff_id, diff)| {
        let staged = staged_diff(revision_id, revision_created, diff);
        match &staged {
            Some(found) => debug!(
                revision = revision_id,
                diff = %diff_id,
                commit = %found.commit,
                "diff has changes staged"
            ),
            None => debug!(revision = revision_id, diff = %diff_id, "diff not staged"),
        }
        staged
    })
}

fn staged_diff(
    revision_id: u64,
    revision_created: DateTime<Utc>,
    diff: &Value,
) -> Option<StagedDiff> {
    // Conduit encodes empty properties as `[]`, which `as_object` rejects.
    let staging = diff
        .get("properties")
        .and_then(Value::as_object)?
        .get(STAGING_PROPERTY)?;
    let staging: Staging = serde_json::from_value(staging.clone()).ok()?;
    if staging.status.as_deref() != Some(STATUS_PUSHED) {
        return None;
    }

    let mut diff_ref = None;
    let mut base_ref = None;
    for staged in &staging.refs {
        match staged.kind.as_deref() {
            Some("diff") => diff_ref = Some(staged),
            Some("base") => base_ref = Some(staged),
            _ => {}
        }
    }
    let (diff_ref, base_ref) = (diff_ref?, base_ref?);

    Some(StagedDiff {
        remote_uri: diff_ref.remote.as_ref()?.uri.clone()?,
        ref_name: diff_ref.name.clone()?,
        commit: diff_ref.commit.clone()?,
        base_ref: base_ref.name.clone()?,
        revision_id,
        revision_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn created() -> DateTime<Utc> {
        DateTime::from_timestamp(1_500_000_000, 0).unwrap()
    }

    fn pushed(diff_ref: &str, commit: &str, base: &str) -> Value {
        json!({
            "properties": {
                "arc.staging": {
                    "status": "pushed",
                    "refs": [
                        {"type": "base", "ref": base, "commit": "0000"},
                        {
                            "type": "diff",
                            "ref": diff_ref,
                            "commit": commit,
                            "remote": {"uri": "https://host/repo.git"}
                        }
                    ]
                }
            }
        })
    }

    #[test]
    fn test_resolves_pushed_diff() {
        let diffs = vec![(
            "99".to_string(),
            pushed("phabricator/diff/99", "def456", "origin/main"),
        )];
        let staged = resolve_staged_diff(42, created(), &diffs).unwrap();
        assert_eq!(staged.remote_uri, "https://host/repo.git");
        assert_eq!(staged.ref_name, "phabricator/diff/99");
        assert_eq!(staged.commit, "def456");
        assert_eq!(staged.base_ref, "origin/main");
        assert_eq!(staged.revision_id, 42);
        assert_eq!(staged.revision_created, created());
    }

    #[test]
    fn test_first_qualifying_diff_wins() {
        let diffs = vec![
            ("10".to_string(), json!({"properties": []})),
            (
                "11".to_string(),
                pushed("phabricator/diff/11", "aaa111", "origin/main"),
            ),
            (
                "12".to_string(),
                pushed("phabricator/diff/12", "bbb222", "origin/main"),
            ),
        ];
        let staged = resolve_staged_diff(7, created(), &diffs).unwrap();
        assert_eq!(staged.ref_name, "phabricator/diff/11");
        assert_eq!(staged.commit, "aaa111");
    }

    #[test]
    fn test_skips_diffs_not_pushed() {
        let diffs = vec![
            ("1".to_string(), json!({})),
            ("2".to_string(), json!({"properties": null})),
            ("3".to_string(), json!({"properties": {"other": 1}})),
            (
                "4".to_string(),
                json!({"properties": {"arc.staging": {"status": "repository.unsupported"}}}),
            ),
        ];
        assert!(resolve_staged_diff(1, created(), &diffs).is_none());
    }

    #[test]
    fn test_requires_both_diff_and_base_refs() {
        let diffs = vec![(
            "5".to_string(),
            json!({
                "properties": {
                    "arc.staging": {
                        "status": "pushed",
                        "refs": [{
                            "type": "diff",
                            "ref": "phabricator/diff/5",
                            "commit": "c0ffee",
                            "remote": {"uri": "https://host/repo.git"}
                        }]
                    }
                }
            }),
        )];
        assert!(resolve_staged_diff(1, created(), &diffs).is_none());
    }

    #[test]
    fn test_last_ref_of_a_type_wins() {
        let diffs = vec![(
            "6".to_string(),
            json!({
                "properties": {
                    "arc.staging": {
                        "status": "pushed",
                        "refs": [
                            {"type": "base", "ref": "origin/old"},
                            {"type": "diff", "ref": "phabricator/diff/1", "commit": "111",
                             "remote": {"uri": "https://host/one.git"}},
                            {"type": "base", "ref": "origin/new"},
                            {"type": "diff", "ref": "phabricator/diff/2", "commit": "222",
                             "remote": {"uri": "https://host/two.git"}}
                        ]
                    }
                }
            }),
        )];
        let staged = resolve_staged_diff(3, created(), &diffs).unwrap();
        assert_eq!(staged.base_ref, "origin/new");
        assert_eq!(staged.ref_name, "phabricator/diff/2");
        assert_eq!(staged.remote_uri, "https://host/two.git");
    }
}
