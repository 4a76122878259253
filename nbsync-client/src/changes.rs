//! Change-log scoping.
//!
//! An object is managed by this engine when the engine's user created it and
//! has not deleted it since. Nautobot records both in `object_changes`, which
//! is only reachable in bulk through GraphQL.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::NautobotClient;
use crate::error::{ClientError, Result};

const OBJECT_CHANGES_QUERY: &str = r#"
query GetObjectChanges($changedObjectType: String, $userName: [String], $action: [String], $limit: Int, $offset: Int) {
  object_changes(
    changed_object_type: $changedObjectType
    user_name: $userName
    action: $action
    limit: $limit
    offset: $offset
  ) {
    id
    user_name
    action
    request_id
    changed_object_id
    related_object_id
  }
}"#;

const PAGE_SIZE: usize = 100;

/// One change-log entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectChange {
    pub id: String,
    #[serde(default)]
    pub user_name: String,
    /// `CREATE`, `UPDATE` or `DELETE`. Matched case-insensitively.
    pub action: String,
    #[serde(default)]
    pub request_id: Option<String>,
    pub changed_object_id: String,
    #[serde(default)]
    pub related_object_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectChangesData {
    #[serde(default)]
    object_changes: Vec<ObjectChange>,
}

impl NautobotClient {
    /// All create/delete entries the configured user recorded for
    /// `object_type`, fetched page by page until an empty page.
    pub async fn object_changes(&self, object_type: &str) -> Result<Vec<ObjectChange>> {
        let mut changes = Vec::new();
        let mut offset = 0;

        loop {
            let variables = json!({
                "changedObjectType": object_type,
                "userName": [self.username()],
                "action": ["create", "delete"],
                "limit": PAGE_SIZE,
                "offset": offset,
            });
            let data = self.graphql(OBJECT_CHANGES_QUERY, variables).await?;
            let page: ObjectChangesData = serde_json::from_value(data)
                .map_err(|source| ClientError::Decode {
                    source,
                    body: String::new(),
                })?;

            if page.object_changes.is_empty() {
                break;
            }
            changes.extend(page.object_changes);
            offset += PAGE_SIZE;
        }

        debug!(object_type, count = changes.len(), "fetched object changes");
        Ok(changes)
    }

    /// Ids of live objects of `object_type` created by this engine, sorted.
    /// `related` narrows the result to changes whose related object (e.g. the
    /// owning device type of a template) matches.
    ///
    /// A failing query is reported and yields no ids, so nothing is treated as
    /// obsolete.
    pub async fn managed_ids(&self, object_type: &str, related: Option<&str>) -> Vec<String> {
        match self.object_changes(object_type).await {
            Ok(changes) => live_object_ids(&changes, related),
            Err(e) => {
                let error = e.to_string();
                self.report().add_fields(
                    "listManagedIds",
                    "failed to query object changes",
                    &[
                        ("object_type", object_type),
                        ("error", error.as_str()),
                        ("response_body", e.response_body()),
                    ],
                );
                Vec::new()
            }
        }
    }
}

/// Group changes by object and keep those whose create and delete counts
/// differ.
fn live_object_ids(changes: &[ObjectChange], related: Option<&str>) -> Vec<String> {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

    for change in changes {
        if let Some(related) = related {
            if change.related_object_id.as_deref() != Some(related) {
                continue;
            }
        }
        let entry = counts.entry(&change.changed_object_id).or_default();
        if change.action.eq_ignore_ascii_case("create") {
            entry.0 += 1;
        } else if change.action.eq_ignore_ascii_case("delete") {
            entry.1 += 1;
        }
    }

    counts
        .into_iter()
        .filter(|(_, (creates, deletes))| creates != deletes)
        .map(|(id, _)| id.to_string())
        .collect()
}
