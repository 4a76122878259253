//! nbsync: reconcile a Nautobot inventory with YAML documents.
//!
//! Each cycle loads the documents for every resource type from their
//! directories, runs the controller, and persists the resulting status. The
//! loop sleeps between cycles until interrupted, or runs once with `--once`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nbsync::documents::load_documents;
use nbsync::{Controller, ControllerConfig, ResourceKind, SyncState};
use nbsync_client::ClientConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Nautobot inventory reconciler
#[derive(Parser, Debug)]
#[command(name = "nbsync", version, about)]
struct Args {
    /// Nautobot API root (e.g., http://nautobot.nautobot.svc.cluster.local/api)
    #[arg(long)]
    nautobot_url: String,

    /// User the API token belongs to; scopes which objects are managed
    #[arg(long, default_value = "nbsync")]
    username: String,

    /// API token
    #[arg(long, env = "NBSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Directories with location type documents
    #[arg(long, value_delimiter = ',')]
    location_types: Vec<PathBuf>,

    /// Directories with location documents
    #[arg(long, value_delimiter = ',')]
    locations: Vec<PathBuf>,

    /// Directories with rack group documents
    #[arg(long, value_delimiter = ',')]
    rack_groups: Vec<PathBuf>,

    /// Directories with rack documents
    #[arg(long, value_delimiter = ',')]
    racks: Vec<PathBuf>,

    /// Directories with device type documents (one device type per file)
    #[arg(long, value_delimiter = ',')]
    device_types: Vec<PathBuf>,

    /// Where the sync status is persisted
    #[arg(long, default_value = "nbsync-state.json")]
    state_file: PathBuf,

    /// Re-sync unchanged documents after this many seconds
    #[arg(long, default_value = "172800")]
    sync_interval_secs: u64,

    /// Seconds between cycles
    #[arg(long, default_value = "600")]
    requeue_after_secs: u64,

    /// Maximum number of collections held by the lookup cache
    #[arg(long, default_value = "70000")]
    cache_max_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn sources(&self) -> [(ResourceKind, &[PathBuf]); 5] {
        [
            (ResourceKind::LocationType, self.location_types.as_slice()),
            (ResourceKind::Location, self.locations.as_slice()),
            (ResourceKind::RackGroup, self.rack_groups.as_slice()),
            (ResourceKind::Rack, self.racks.as_slice()),
            (ResourceKind::DeviceType, self.device_types.as_slice()),
        ]
    }

    fn controller_config(&self) -> ControllerConfig {
        let mut client = ClientConfig::new(&self.nautobot_url, &self.username, self.token.clone());
        client.cache_max_size = self.cache_max_size;
        client.request_timeout = Duration::from_secs(self.request_timeout_secs);

        ControllerConfig {
            client,
            sync_interval: Duration::from_secs(self.sync_interval_secs),
            requeue_after: Duration::from_secs(self.requeue_after_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "nbsync=info,nbsync_client=info,reqwest=warn,hyper=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting nbsync against {}", args.nautobot_url);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            signal_cancel.cancel();
        }
    });

    let controller = Controller::new(args.controller_config(), cancel.clone());

    loop {
        let requeue_after = match run_cycle(&args, &controller).await {
            Ok(requeue_after) => requeue_after,
            Err(e) => {
                error!("Cycle failed: {:#}", e);
                Duration::from_secs(args.requeue_after_secs)
            }
        };

        if args.once || cancel.is_cancelled() {
            break;
        }

        info!("Next cycle in {}s", requeue_after.as_secs());
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(requeue_after) => {}
        }
    }

    info!("nbsync stopped");
    Ok(())
}

/// Run one cycle and persist the state. Returns the delay before the next.
async fn run_cycle(args: &Args, controller: &Controller) -> Result<Duration> {
    let mut desired = BTreeMap::new();
    for (kind, dirs) in args.sources() {
        let documents = load_documents(dirs)
            .await
            .with_context(|| format!("failed to load {} documents", kind))?;
        desired.insert(kind, documents);
    }

    let mut state = SyncState::load(&args.state_file)
        .await
        .with_context(|| format!("failed to load state from {}", args.state_file.display()))?;

    let result = controller.reconcile(&desired, &mut state).await;

    state
        .save(&args.state_file)
        .await
        .with_context(|| format!("failed to save state to {}", args.state_file.display()))?;

    let outcome = result.context("reconcile failed")?;
    for (kind, summary) in &outcome.summaries {
        info!(
            "{}: {} created, {} updated, {} unchanged, {} deleted, {} failed",
            kind,
            summary.created,
            summary.updated,
            summary.unchanged,
            summary.deleted,
            summary.failed
        );
    }
    Ok(outcome.requeue_after)
}
