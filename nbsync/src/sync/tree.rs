//! Hierarchical sync orchestrator.
//!
//! Desired trees are walked depth-first: a node is synced before its
//! children, and each child receives the remote id its parent resolved to.
//! Obsolete objects are deleted children-first along the remote parent
//! references.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use nbsync_client::models::{Nested, Resource, Writable};
use nbsync_client::{NautobotClient, Service};
use tracing::{debug, info, warn};

use super::{SyncSummary, Upsert, parse, record_failure};
use crate::desired::{DesiredNode, DocumentShape, collect_names};
use crate::error::{Result, SyncError};

/// Per-type hooks for the orchestrator.
#[async_trait]
pub trait TreeSync: Send + Sync {
    type Node: DesiredNode;
    type Remote: Nested + Writable;

    fn client(&self) -> &NautobotClient;

    fn service(&self) -> &Service<Self::Remote>;

    /// Create or update `node` under `parent_id` (`None` for roots).
    async fn sync_node(
        &self,
        node: &Self::Node,
        parent_id: Option<&str>,
    ) -> Result<Upsert<Self::Remote>>;
}

/// Full sync of a tree type: parse, walk, then delete obsolete objects.
pub async fn run<S: TreeSync>(
    sync: &S,
    documents: &BTreeMap<String, String>,
) -> Result<SyncSummary> {
    let roots: Vec<S::Node> = parse(sync.client(), documents, DocumentShape::List)?;
    let mut summary = SyncSummary::default();

    sync_tree(sync, &roots, &mut summary).await;
    if sync.client().is_cancelled() {
        return Err(SyncError::Cancelled);
    }

    delete_obsolete_tree(sync.service(), &collect_names(&roots), &mut summary).await;
    info!(kind = S::Remote::KIND, ?summary, "sync completed");
    Ok(summary)
}

/// Sync every root and its descendants in document order.
pub async fn sync_tree<S: TreeSync>(sync: &S, roots: &[S::Node], summary: &mut SyncSummary) {
    for root in roots {
        sync_recursive(sync, root, None, summary).await;
    }
}

fn sync_recursive<'a, S: TreeSync>(
    sync: &'a S,
    node: &'a S::Node,
    parent_id: Option<String>,
    summary: &'a mut SyncSummary,
) -> BoxFuture<'a, ()> {
    async move {
        if sync.client().is_cancelled() {
            return;
        }

        let current_id = match sync.sync_node(node, parent_id.as_deref()).await {
            Ok(outcome) => {
                summary.record(&outcome);
                outcome.get().id().to_string()
            }
            Err(e) => {
                record_failure(sync.client(), S::Remote::KIND, node.name(), &e, summary);
                let skipped = count_descendants(node);
                if skipped > 0 {
                    warn!(kind = S::Remote::KIND, name = node.name(), skipped, "skipping children");
                    summary.skipped += skipped;
                }
                return;
            }
        };

        for child in node.children() {
            sync_recursive(sync, child, Some(current_id.clone()), summary).await;
        }
    }
    .boxed()
}

fn count_descendants<T: DesiredNode>(node: &T) -> usize {
    node.children()
        .iter()
        .map(|child| 1 + count_descendants(child))
        .sum()
}

/// Delete every managed object whose name is not in `desired`, children
/// before parents.
///
/// An object is kept (and reported) when one of its obsolete children could
/// not be deleted, when it still has remote children that are not obsolete,
/// or when its parent references form a cycle.
pub async fn delete_obsolete_tree<R: Nested>(
    service: &Service<R>,
    desired: &BTreeSet<String>,
    summary: &mut SyncSummary,
) {
    if service.client().is_cancelled() {
        return;
    }

    let obsolete: BTreeMap<String, R> = service
        .list_all()
        .await
        .into_iter()
        .filter(|r| !desired.contains(r.name()))
        .map(|r| (r.id().to_string(), r))
        .collect();
    if obsolete.is_empty() {
        debug!(kind = R::KIND, "no obsolete objects");
        return;
    }

    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    for (id, resource) in &obsolete {
        if let Some(parent) = resource.parent_id() {
            if obsolete.contains_key(parent) {
                children.entry(parent.to_string()).or_default().push(id.clone());
            }
        }
    }

    let mut deleter = Deleter {
        service,
        obsolete: &obsolete,
        children: &children,
        visits: HashMap::new(),
        summary,
    };
    for id in obsolete.keys() {
        deleter.delete(id).await;
    }
}

/// Delete every managed object whose name is not in `desired`. No ordering.
pub async fn delete_obsolete_flat<R: Resource>(
    service: &Service<R>,
    desired: &BTreeSet<String>,
    summary: &mut SyncSummary,
) {
    if service.client().is_cancelled() {
        return;
    }
    for resource in service.list_all().await {
        if desired.contains(resource.name()) {
            continue;
        }
        if service.destroy(resource.id()).await {
            summary.deleted += 1;
        } else {
            summary.failed += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Deleted,
    Kept,
}

struct Deleter<'a, R: Resource> {
    service: &'a Service<R>,
    obsolete: &'a BTreeMap<String, R>,
    children: &'a HashMap<String, Vec<String>>,
    visits: HashMap<String, Visit>,
    summary: &'a mut SyncSummary,
}

impl<'a, R: Nested> Deleter<'a, R> {
    fn name(&self, id: &str) -> &'a str {
        self.obsolete.get(id).map_or("", |r| r.name())
    }

    /// Mark `id` as kept and report it. A node is reported at most once.
    fn keep(&mut self, id: &str, reason: &str) -> bool {
        if self.visits.insert(id.to_string(), Visit::Kept) == Some(Visit::Kept) {
            return false;
        }
        self.summary.failed += 1;
        self.service.client().report().add_fields(
            &format!("destroy{}", R::KIND),
            reason,
            &[("id", id), ("name", self.name(id))],
        );
        false
    }

    /// Returns whether `id` is gone.
    fn delete<'b>(&'b mut self, id: &'b str) -> BoxFuture<'b, bool>
    where
        'a: 'b,
    {
        async move {
            match self.visits.get(id) {
                Some(Visit::Deleted) => return true,
                Some(Visit::Kept) => return false,
                Some(Visit::InProgress) => {
                    return self.keep(id, "parent references form a cycle, not deleting");
                }
                None => {}
            }
            if self.service.client().is_cancelled() {
                return false;
            }
            self.visits.insert(id.to_string(), Visit::InProgress);

            let adjacency = self.children;
            let mut children_gone = true;
            if let Some(children) = adjacency.get(id) {
                for child in children {
                    children_gone &= self.delete(child).await;
                }
            }
            // Children left behind by cancellation did not fail.
            if self.service.client().is_cancelled() {
                return false;
            }
            if !children_gone {
                return self.keep(id, "obsolete children could not be deleted, not deleting");
            }

            let Some(remote_children) = self.service.list_children(id).await else {
                self.visits.insert(id.to_string(), Visit::Kept);
                self.summary.failed += 1;
                return false;
            };
            let retained: Vec<&str> = remote_children
                .iter()
                .filter(|c| self.visits.get(c.id()) != Some(&Visit::Deleted))
                .map(|c| c.name())
                .collect();
            if !retained.is_empty() {
                let reason = format!(
                    "still has children [{}], not deleting",
                    retained.join(", ")
                );
                return self.keep(id, &reason);
            }

            if self.service.destroy(id).await {
                self.visits.insert(id.to_string(), Visit::Deleted);
                self.summary.deleted += 1;
                true
            } else {
                self.visits.insert(id.to_string(), Visit::Kept);
                self.summary.failed += 1;
                false
            }
        }
        .boxed()
    }
}
