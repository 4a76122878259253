//! Locations: a tree; each node references a location type and a status.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use nbsync_client::models::{Location, LocationRequest, LocationType, Resource, Status};
use nbsync_client::{NautobotClient, Service};

use super::tree::{self, TreeSync};
use super::{SyncSummary, Synchronizer, Upsert, missing, upsert};
use crate::desired::LocationSpec;
use crate::error::Result;

pub struct LocationSync {
    client: Arc<NautobotClient>,
    locations: Service<Location>,
    location_types: Service<LocationType>,
    statuses: Service<Status>,
}

impl LocationSync {
    pub fn new(client: Arc<NautobotClient>) -> Self {
        Self {
            locations: Service::new(Arc::clone(&client)),
            location_types: Service::new(Arc::clone(&client)),
            statuses: Service::new(Arc::clone(&client)),
            client,
        }
    }
}

#[async_trait]
impl TreeSync for LocationSync {
    type Node = LocationSpec;
    type Remote = Location;

    fn client(&self) -> &NautobotClient {
        &self.client
    }

    fn service(&self) -> &Service<Location> {
        &self.locations
    }

    async fn sync_node(
        &self,
        node: &LocationSpec,
        parent_id: Option<&str>,
    ) -> Result<Upsert<Location>> {
        let location_type = self
            .location_types
            .get_by_name(&node.location_type)
            .await
            .ok_or_else(|| {
                missing(Location::KIND, &node.name, format!("location type {}", node.location_type))
            })?;
        let status = self
            .statuses
            .get_by_name(&node.status)
            .await
            .ok_or_else(|| missing(Location::KIND, &node.name, format!("status {}", node.status)))?;

        let request = LocationRequest {
            name: node.name.clone(),
            description: node.description.clone(),
            location_type: location_type.id,
            status: status.id,
            parent: parent_id.map(str::to_string),
        };
        let existing = self.locations.get_by_name(&node.name).await;
        upsert(&self.locations, existing, &request).await
    }
}

#[async_trait]
impl Synchronizer for LocationSync {
    async fn sync_all(&self, documents: &BTreeMap<String, String>) -> Result<SyncSummary> {
        tree::run(self, documents).await
    }
}
