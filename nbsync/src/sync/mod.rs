//! Resource synchronizers.
//!
//! Each resource type has a synchronizer that parses its documents, creates or
//! updates remote objects so they match, and deletes managed objects that are
//! no longer desired. Nesting types go through the orchestrator in [`tree`].

mod device_type;
mod location;
mod location_type;
mod rack;
mod rack_group;
pub mod tree;

use std::collections::BTreeMap;

use async_trait::async_trait;
use nbsync_client::models::{Resource, Writable};
use nbsync_client::{NautobotClient, Service, compare};
use tracing::{info, warn};

use crate::desired::{DesiredNode, DocumentShape, parse_documents};
use crate::error::{Result, SyncError};

pub use device_type::DeviceTypeSync;
pub use location::LocationSync;
pub use location_type::LocationTypeSync;
pub use rack::RackSync;
pub use rack_group::RackGroupSync;

/// Report key for documents that failed to parse.
pub const YAML_FAILED: &str = "yamlFailed";

/// Synchronizes every object of one resource type.
#[async_trait]
pub trait Synchronizer: Send + Sync {
    /// Bring the remote in line with `documents`. Per-object remote failures
    /// are reported and counted; only parse errors and cancellation are
    /// returned as errors.
    async fn sync_all(&self, documents: &BTreeMap<String, String>) -> Result<SyncSummary>;
}

/// Counts of what a sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Desired nodes never attempted because an ancestor failed.
    pub skipped: usize,
}

impl SyncSummary {
    pub fn record<R>(&mut self, outcome: &Upsert<R>) {
        match outcome {
            Upsert::Created(_) => self.created += 1,
            Upsert::Updated(_) => self.updated += 1,
            Upsert::Unchanged(_) => self.unchanged += 1,
        }
    }

    pub fn merge(&mut self, other: &SyncSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    /// Number of remote writes performed.
    pub fn writes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Result of reconciling one object.
#[derive(Debug, Clone)]
pub enum Upsert<R> {
    Created(R),
    Updated(R),
    Unchanged(R),
}

impl<R> Upsert<R> {
    pub fn into_inner(self) -> R {
        match self {
            Upsert::Created(r) | Upsert::Updated(r) | Upsert::Unchanged(r) => r,
        }
    }

    pub fn get(&self) -> &R {
        match self {
            Upsert::Created(r) | Upsert::Updated(r) | Upsert::Unchanged(r) => r,
        }
    }
}

/// Create `request` if nothing exists, update when the existing object
/// differs, otherwise leave it alone. Failed writes were already reported by
/// the service.
pub(crate) async fn upsert<R: Writable>(
    service: &Service<R>,
    existing: Option<R>,
    request: &R::Request,
) -> Result<Upsert<R>> {
    let name = R::request_name(request);
    let write_failed = |action| SyncError::Write {
        kind: R::KIND,
        name: name.to_string(),
        action,
    };

    match existing {
        None => service
            .create(request)
            .await
            .map(Upsert::Created)
            .ok_or_else(|| write_failed("create")),
        Some(existing) if !compare::equal(&existing, request) => service
            .update(existing.id(), request)
            .await
            .map(Upsert::Updated)
            .ok_or_else(|| write_failed("update")),
        Some(existing) => {
            info!(kind = R::KIND, name, "unchanged, skipping update");
            Ok(Upsert::Unchanged(existing))
        }
    }
}

/// Parse documents, recording a failure under [`YAML_FAILED`].
pub(crate) fn parse<T: DesiredNode>(
    client: &NautobotClient,
    documents: &BTreeMap<String, String>,
    shape: DocumentShape,
) -> Result<Vec<T>> {
    parse_documents(documents, shape).inspect_err(|e| {
        if let SyncError::Parse { document, source } = e {
            client
                .report()
                .add(YAML_FAILED, format!("file: {} error: {}", document, source));
        }
    })
}

/// Record a node that could not be synced. Write failures were reported by
/// the service; anything else is reported here.
pub(crate) fn record_failure(
    client: &NautobotClient,
    kind: &str,
    name: &str,
    error: &SyncError,
    summary: &mut SyncSummary,
) {
    summary.failed += 1;
    match error {
        SyncError::Write { .. } => warn!(kind, name, error = %error, "sync failed"),
        _ => client
            .report()
            .add_fields(&format!("sync{}", kind), &error.to_string(), &[("name", name)]),
    }
}

/// Error for a foreign key that did not resolve.
pub(crate) fn missing(kind: &'static str, name: &str, dependency: impl Into<String>) -> SyncError {
    SyncError::MissingDependency {
        kind,
        name: name.to_string(),
        dependency: dependency.into(),
    }
}
