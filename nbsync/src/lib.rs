//! nbsync: keeps a Nautobot inventory in line with declarative YAML.
//!
//! A reconciliation cycle ([`Controller::reconcile`]) hashes the desired
//! documents of each resource type, decides which types need a sync, and runs
//! the type's synchronizer against the remote. Synchronizers walk the desired
//! trees parent-first, write only what differs, and finally delete managed
//! remote objects that are no longer desired, children before parents.

pub mod controller;
pub mod decision;
pub mod desired;
pub mod documents;
pub mod error;
pub mod state;
pub mod sync;

pub use controller::{Controller, ControllerConfig, ReconcileOutcome, ResourceKind};
pub use decision::{SyncDecision, compute_hash, decide, decide_at};
pub use error::SyncError;
pub use state::SyncState;
