//! Rack groups: a tree; each node belongs to a location.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use nbsync_client::models::{Location, RackGroup, RackGroupRequest, Resource};
use nbsync_client::{NautobotClient, Service};

use super::tree::{self, TreeSync};
use super::{SyncSummary, Synchronizer, Upsert, missing, upsert};
use crate::desired::RackGroupSpec;
use crate::error::Result;

pub struct RackGroupSync {
    client: Arc<NautobotClient>,
    rack_groups: Service<RackGroup>,
    locations: Service<Location>,
}

impl RackGroupSync {
    pub fn new(client: Arc<NautobotClient>) -> Self {
        Self {
            rack_groups: Service::new(Arc::clone(&client)),
            locations: Service::new(Arc::clone(&client)),
            client,
        }
    }
}

#[async_trait]
impl TreeSync for RackGroupSync {
    type Node = RackGroupSpec;
    type Remote = RackGroup;

    fn client(&self) -> &NautobotClient {
        &self.client
    }

    fn service(&self) -> &Service<RackGroup> {
        &self.rack_groups
    }

    async fn sync_node(
        &self,
        node: &RackGroupSpec,
        parent_id: Option<&str>,
    ) -> Result<Upsert<RackGroup>> {
        let location = self
            .locations
            .get_by_name(&node.location)
            .await
            .ok_or_else(|| {
                missing(RackGroup::KIND, &node.name, format!("location {}", node.location))
            })?;

        let request = RackGroupRequest {
            name: node.name.clone(),
            description: node.description.clone(),
            location: location.id,
            parent: parent_id.map(str::to_string),
        };
        let existing = self.rack_groups.get_by_name(&node.name).await;
        upsert(&self.rack_groups, existing, &request).await
    }
}

#[async_trait]
impl Synchronizer for RackGroupSync {
    async fn sync_all(&self, documents: &BTreeMap<String, String>) -> Result<SyncSummary> {
        tree::run(self, documents).await
    }
}
