//! Racks: a flat list placed in a location and optionally a rack group.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use nbsync_client::models::{Location, Rack, RackGroup, RackRequest, Resource, Status};
use nbsync_client::{NautobotClient, Service};
use tracing::info;

use super::tree::delete_obsolete_flat;
use super::{SyncSummary, Synchronizer, Upsert, missing, parse, record_failure, upsert};
use crate::desired::{DesiredNode, DocumentShape, RackSpec, collect_names};
use crate::error::{Result, SyncError};

pub struct RackSync {
    client: Arc<NautobotClient>,
    racks: Service<Rack>,
    rack_groups: Service<RackGroup>,
    locations: Service<Location>,
    statuses: Service<Status>,
}

impl RackSync {
    pub fn new(client: Arc<NautobotClient>) -> Self {
        Self {
            racks: Service::new(Arc::clone(&client)),
            rack_groups: Service::new(Arc::clone(&client)),
            locations: Service::new(Arc::clone(&client)),
            statuses: Service::new(Arc::clone(&client)),
            client,
        }
    }

    async fn sync_rack(&self, rack: &RackSpec) -> Result<Upsert<Rack>> {
        let location = self
            .locations
            .get_by_name(&rack.location)
            .await
            .ok_or_else(|| missing(Rack::KIND, &rack.name, format!("location {}", rack.location)))?;
        let status = self
            .statuses
            .get_by_name(&rack.status)
            .await
            .ok_or_else(|| missing(Rack::KIND, &rack.name, format!("status {}", rack.status)))?;
        let rack_group = if rack.rack_group.is_empty() {
            None
        } else {
            let group = self.rack_groups.get_by_name(&rack.rack_group).await.ok_or_else(|| {
                missing(Rack::KIND, &rack.name, format!("rack group {}", rack.rack_group))
            })?;
            Some(group.id)
        };

        let request = RackRequest {
            name: rack.name.clone(),
            comments: rack.description.clone(),
            location: location.id,
            status: status.id,
            u_height: rack.u_height,
            facility_id: Some(rack.facility.clone()).filter(|f| !f.is_empty()),
            rack_group,
        };
        let existing = self.racks.get_by_name(&rack.name).await;
        upsert(&self.racks, existing, &request).await
    }
}

#[async_trait]
impl Synchronizer for RackSync {
    async fn sync_all(&self, documents: &BTreeMap<String, String>) -> Result<SyncSummary> {
        let racks: Vec<RackSpec> = parse(&self.client, documents, DocumentShape::List)?;
        let mut summary = SyncSummary::default();

        for rack in &racks {
            if self.client.is_cancelled() {
                break;
            }
            match self.sync_rack(rack).await {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => record_failure(&self.client, Rack::KIND, rack.name(), &e, &mut summary),
            }
        }
        if self.client.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        delete_obsolete_flat(&self.racks, &collect_names(&racks), &mut summary).await;
        info!(kind = Rack::KIND, ?summary, "sync completed");
        Ok(summary)
    }
}
