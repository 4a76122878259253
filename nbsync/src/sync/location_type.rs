//! Location types: a tree, no foreign keys besides the parent.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use nbsync_client::models::{LocationType, LocationTypeRequest};
use nbsync_client::{NautobotClient, Service};

use super::tree::{self, TreeSync};
use super::{SyncSummary, Synchronizer, Upsert, upsert};
use crate::desired::LocationTypeSpec;
use crate::error::Result;

pub struct LocationTypeSync {
    client: Arc<NautobotClient>,
    location_types: Service<LocationType>,
}

impl LocationTypeSync {
    pub fn new(client: Arc<NautobotClient>) -> Self {
        Self {
            location_types: Service::new(Arc::clone(&client)),
            client,
        }
    }
}

#[async_trait]
impl TreeSync for LocationTypeSync {
    type Node = LocationTypeSpec;
    type Remote = LocationType;

    fn client(&self) -> &NautobotClient {
        &self.client
    }

    fn service(&self) -> &Service<LocationType> {
        &self.location_types
    }

    async fn sync_node(
        &self,
        node: &LocationTypeSpec,
        parent_id: Option<&str>,
    ) -> Result<Upsert<LocationType>> {
        let request = LocationTypeRequest {
            name: node.name.clone(),
            description: node.description.clone(),
            content_types: node.content_types.clone(),
            nestable: node.nestable,
            parent: parent_id.map(str::to_string),
        };
        let existing = self.location_types.get_by_name(&node.name).await;
        upsert(&self.location_types, existing, &request).await
    }
}

#[async_trait]
impl Synchronizer for LocationTypeSync {
    async fn sync_all(&self, documents: &BTreeMap<String, String>) -> Result<SyncSummary> {
        tree::run(self, documents).await
    }
}
