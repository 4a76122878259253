//! Reconciliation cycle.
//!
//! One call to [`Controller::reconcile`] decides per resource type whether a
//! sync is due, syncs the due types in dependency order against a fresh
//! client, and records the outcome in the [`SyncState`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nbsync_client::{ClientConfig, NautobotClient};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::decision::{compute_hash, decide};
use crate::error::{Result, SyncError};
use crate::state::SyncState;
use crate::sync::{
    DeviceTypeSync, LocationSync, LocationTypeSync, RackGroupSync, RackSync, SyncSummary,
    Synchronizer,
};

pub const MESSAGE_NO_CHANGES: &str = "No changes detected";
pub const MESSAGE_SUCCESS: &str = "Sync Successful";
pub const MESSAGE_PARTIAL: &str = "sync completed with some errors";

/// Default full-resync interval (48 hours).
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(172_800);
/// Default delay before the next cycle.
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(600);

/// Managed resource types, in the order they are synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    LocationType,
    Location,
    RackGroup,
    Rack,
    DeviceType,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::LocationType,
        ResourceKind::Location,
        ResourceKind::RackGroup,
        ResourceKind::Rack,
        ResourceKind::DeviceType,
    ];

    /// Key used in the persisted sync hashes.
    pub fn key(self) -> &'static str {
        match self {
            ResourceKind::LocationType => "locationType",
            ResourceKind::Location => "location",
            ResourceKind::RackGroup => "rackGroup",
            ResourceKind::Rack => "rack",
            ResourceKind::DeviceType => "deviceType",
        }
    }

    fn synchronizer(self, client: Arc<NautobotClient>) -> Box<dyn Synchronizer> {
        match self {
            ResourceKind::LocationType => Box::new(LocationTypeSync::new(client)),
            ResourceKind::Location => Box::new(LocationSync::new(client)),
            ResourceKind::RackGroup => Box::new(RackGroupSync::new(client)),
            ResourceKind::Rack => Box::new(RackSync::new(client)),
            ResourceKind::DeviceType => Box::new(DeviceTypeSync::new(client)),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub client: ClientConfig,
    /// Unchanged documents are re-synced after this long.
    pub sync_interval: Duration,
    /// Upper bound on the delay before the next cycle.
    pub requeue_after: Duration,
}

impl ControllerConfig {
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            requeue_after: DEFAULT_REQUEUE_AFTER,
        }
    }
}

/// What a cycle did.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Types that were synced, in sync order.
    pub synced: Vec<ResourceKind>,
    pub summaries: BTreeMap<ResourceKind, SyncSummary>,
    /// When to run the next cycle.
    pub requeue_after: Duration,
}

pub struct Controller {
    config: ControllerConfig,
    cancel: CancellationToken,
}

/// Clears the client's lookup cache when the cycle ends, on every path.
struct CacheGuard<'a>(&'a NautobotClient);

impl Drop for CacheGuard<'_> {
    fn drop(&mut self) {
        self.0.cache().clear();
        info!("cleared cache after reconcile");
    }
}

impl Controller {
    pub fn new(config: ControllerConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Run one cycle over `desired` (documents per type; a missing type has
    /// no documents) and update `state` in place.
    ///
    /// A fatal error (unparseable documents, cancellation) leaves the hashes
    /// and `last_synced_at` untouched so every due type is retried; the
    /// report gathered so far is still recorded.
    pub async fn reconcile(
        &self,
        desired: &BTreeMap<ResourceKind, BTreeMap<String, String>>,
        state: &mut SyncState,
    ) -> Result<ReconcileOutcome> {
        self.reconcile_with(|| self.client(), desired, state).await
    }

    fn client(&self) -> Result<Arc<NautobotClient>> {
        let client = NautobotClient::new(self.config.client.clone(), self.cancel.clone())?;
        Ok(Arc::new(client))
    }

    /// [`Controller::reconcile`] with the client supplied by `make_client`,
    /// which is only called when some type is due.
    pub async fn reconcile_with<F>(
        &self,
        make_client: F,
        desired: &BTreeMap<ResourceKind, BTreeMap<String, String>>,
        state: &mut SyncState,
    ) -> Result<ReconcileOutcome>
    where
        F: FnOnce() -> Result<Arc<NautobotClient>>,
    {
        let empty = BTreeMap::new();
        let mut outcome = ReconcileOutcome {
            requeue_after: self.config.requeue_after,
            ..Default::default()
        };

        let mut due = Vec::new();
        for kind in ResourceKind::ALL {
            let documents = desired.get(&kind).unwrap_or(&empty);
            let current = compute_hash(documents);
            let decision = decide(
                state.last_synced_at,
                self.config.sync_interval,
                &current,
                state.sync_hash(kind.key()),
            );
            outcome.requeue_after = outcome.requeue_after.min(decision.requeue_after);

            if decision.should_sync {
                info!(resource = %kind, reason = decision.reason, "resource needs sync");
                due.push((kind, documents, current));
            } else {
                info!(resource = %kind, reason = decision.reason, "skipping resource sync");
            }
        }

        if due.is_empty() {
            state.message = MESSAGE_NO_CHANGES.to_string();
            return Ok(outcome);
        }

        let client = make_client()?;
        let result = self.sync_due(&client, &due, &mut outcome).await;
        if let Err(SyncError::Cancelled) = result {
            client
                .report()
                .add("reconcile", "cancelled, remaining work skipped");
        }
        state.report = client.report().snapshot();

        if let Err(e) = result {
            error!(error = %e, "reconcile failed");
            state.message = format!("sync failed: {}", e);
            return Err(e);
        }

        for (kind, _, hash) in &due {
            state.set_sync_hash(kind.key(), hash);
        }
        state.last_synced_at = Some(Utc::now());
        state.ready = true;
        state.message = if state.report.is_empty() {
            MESSAGE_SUCCESS
        } else {
            MESSAGE_PARTIAL
        }
        .to_string();

        info!(synced = outcome.synced.len(), message = %state.message, "sync completed");
        Ok(outcome)
    }

    async fn sync_due(
        &self,
        client: &Arc<NautobotClient>,
        due: &[(ResourceKind, &BTreeMap<String, String>, String)],
        outcome: &mut ReconcileOutcome,
    ) -> Result<()> {
        client.preload_cache().await;
        let _guard = CacheGuard(client);

        for (kind, documents, _) in due {
            if documents.is_empty() {
                info!(resource = %kind, "no documents, nothing to sync");
                continue;
            }
            info!(resource = %kind, count = documents.len(), "syncing");
            let summary = kind
                .synchronizer(Arc::clone(client))
                .sync_all(documents)
                .await
                .inspect_err(|e| error!(resource = %kind, error = %e, "failed to sync resource"))?;
            outcome.synced.push(*kind);
            outcome.summaries.insert(*kind, summary);
        }
        Ok(())
    }
}
