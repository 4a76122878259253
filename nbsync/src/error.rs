//! Sync error types.

use thiserror::Error;

/// Errors that abort the sync of a resource type or a whole cycle.
///
/// Remote failures on individual objects are not errors: they are recorded in
/// the client's report and the walk continues.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to parse document {document}: {source}")]
    Parse {
        document: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A node references an object that does not exist remotely.
    #[error("{kind} {name}: {dependency} not found")]
    MissingDependency {
        kind: &'static str,
        name: String,
        dependency: String,
    },

    /// A create or update the node's children depend on did not succeed.
    #[error("{kind} {name}: {action} failed")]
    Write {
        kind: &'static str,
        name: String,
        action: &'static str,
    },

    #[error("reconciliation cancelled")]
    Cancelled,

    #[error("client: {0}")]
    Client(#[from] nbsync_client::ClientError),

    #[error("state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file: {0}")]
    State(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
