//! Device types and their component templates.
//!
//! One document per device type. The manufacturer is created on demand.
//! Templates are reconciled per device type, scoped to the templates this
//! engine created for it, and only once the device type itself is in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use nbsync_client::models::{
    ConsolePortTemplate, ConsolePortTemplateRequest, DeviceType, DeviceTypeRequest,
    InterfaceTemplate, InterfaceTemplateRequest, Manufacturer, ManufacturerRequest,
    ModuleBayTemplate, ModuleBayTemplateRequest, PowerPortTemplate, PowerPortTemplateRequest,
    Resource, Template,
};
use nbsync_client::{NautobotClient, Service};
use tracing::{debug, info};

use super::tree::delete_obsolete_flat;
use super::{SyncSummary, Synchronizer, parse, record_failure, upsert};
use crate::desired::{DesiredNode, DeviceTypeSpec, DocumentShape, collect_names};
use crate::error::{Result, SyncError};

pub struct DeviceTypeSync {
    client: Arc<NautobotClient>,
    manufacturers: Service<Manufacturer>,
    device_types: Service<DeviceType>,
    interfaces: Service<InterfaceTemplate>,
    console_ports: Service<ConsolePortTemplate>,
    power_ports: Service<PowerPortTemplate>,
    module_bays: Service<ModuleBayTemplate>,
}

impl DeviceTypeSync {
    pub fn new(client: Arc<NautobotClient>) -> Self {
        Self {
            manufacturers: Service::new(Arc::clone(&client)),
            device_types: Service::new(Arc::clone(&client)),
            interfaces: Service::new(Arc::clone(&client)),
            console_ports: Service::new(Arc::clone(&client)),
            power_ports: Service::new(Arc::clone(&client)),
            module_bays: Service::new(Arc::clone(&client)),
            client,
        }
    }

    async fn manufacturer(&self, name: &str, model: &str) -> Result<Manufacturer> {
        if let Some(existing) = self.manufacturers.get_by_name(name).await {
            return Ok(existing);
        }
        let request = ManufacturerRequest {
            name: name.to_string(),
            description: name.to_string(),
        };
        self.manufacturers
            .create(&request)
            .await
            .ok_or_else(|| SyncError::Write {
                kind: DeviceType::KIND,
                name: model.to_string(),
                action: "create manufacturer",
            })
    }

    async fn sync_device_type(
        &self,
        spec: &DeviceTypeSpec,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        let manufacturer = self.manufacturer(&spec.manufacturer, &spec.model).await?;
        let request = DeviceTypeRequest {
            model: spec.model.clone(),
            manufacturer: manufacturer.id,
            part_number: spec.part_number.clone(),
            u_height: spec.u_height,
            is_full_depth: spec.is_full_depth,
            comments: spec.comments.clone(),
        };
        let existing = self.device_types.get_by_name(&spec.model).await;
        let outcome = upsert(&self.device_types, existing, &request).await?;
        summary.record(&outcome);

        let device_type = outcome.into_inner();
        let id = device_type.id.as_str();
        sync_templates(&self.interfaces, id, interface_requests(spec, id), summary).await;
        sync_templates(&self.console_ports, id, console_port_requests(spec, id), summary).await;
        sync_templates(&self.power_ports, id, power_port_requests(spec, id), summary).await;
        sync_templates(&self.module_bays, id, module_bay_requests(spec, id), summary).await;
        Ok(())
    }
}

#[async_trait]
impl Synchronizer for DeviceTypeSync {
    async fn sync_all(&self, documents: &BTreeMap<String, String>) -> Result<SyncSummary> {
        let device_types: Vec<DeviceTypeSpec> =
            parse(&self.client, documents, DocumentShape::Single)?;
        let mut summary = SyncSummary::default();

        for spec in &device_types {
            if self.client.is_cancelled() {
                break;
            }
            if let Err(e) = self.sync_device_type(spec, &mut summary).await {
                record_failure(&self.client, DeviceType::KIND, spec.name(), &e, &mut summary);
            }
        }
        if self.client.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        delete_obsolete_flat(&self.device_types, &collect_names(&device_types), &mut summary).await;
        info!(kind = DeviceType::KIND, ?summary, "sync completed");
        Ok(summary)
    }
}

/// Reconcile one kind of template on device type `device_type_id`. Desired
/// requests are keyed by name; a repeated name keeps the last definition.
async fn sync_templates<R: Template>(
    service: &Service<R>,
    device_type_id: &str,
    desired: Vec<R::Request>,
    summary: &mut SyncSummary,
) {
    let desired: BTreeMap<String, R::Request> = desired
        .into_iter()
        .map(|request| (R::request_name(&request).to_string(), request))
        .collect();
    let mut existing: BTreeMap<String, R> = service
        .list_by_device_type(device_type_id)
        .await
        .into_iter()
        .map(|template| (template.name().to_string(), template))
        .collect();

    for (name, request) in &desired {
        match upsert(service, existing.remove(name), request).await {
            Ok(outcome) => summary.record(&outcome),
            Err(_) => summary.failed += 1,
        }
    }

    // Whatever is left in `existing` is no longer desired.
    for (name, obsolete) in existing {
        debug!(kind = R::KIND, name, device_type_id, "deleting obsolete template");
        if service.destroy(obsolete.id()).await {
            summary.deleted += 1;
        } else {
            summary.failed += 1;
        }
    }
}

fn interface_requests(
    spec: &DeviceTypeSpec,
    device_type_id: &str,
) -> Vec<InterfaceTemplateRequest> {
    spec.interfaces
        .iter()
        .map(|i| InterfaceTemplateRequest {
            name: i.name.clone(),
            kind: i.kind.clone(),
            mgmt_only: i.mgmt_only,
            device_type: device_type_id.to_string(),
        })
        .collect()
}

fn console_port_requests(
    spec: &DeviceTypeSpec,
    device_type_id: &str,
) -> Vec<ConsolePortTemplateRequest> {
    spec.console_ports
        .iter()
        .map(|p| ConsolePortTemplateRequest {
            name: p.name.clone(),
            kind: p.kind.clone(),
            device_type: device_type_id.to_string(),
        })
        .collect()
}

/// Non-positive draws are left unset.
fn power_port_requests(
    spec: &DeviceTypeSpec,
    device_type_id: &str,
) -> Vec<PowerPortTemplateRequest> {
    let draw = |value: i64| u32::try_from(value).ok().filter(|v| *v > 0);
    spec.power_ports
        .iter()
        .map(|p| PowerPortTemplateRequest {
            name: p.name.clone(),
            kind: p.kind.clone(),
            maximum_draw: draw(p.maximum_draw),
            allocated_draw: draw(p.allocated_draw),
            device_type: device_type_id.to_string(),
        })
        .collect()
}

fn module_bay_requests(
    spec: &DeviceTypeSpec,
    device_type_id: &str,
) -> Vec<ModuleBayTemplateRequest> {
    spec.module_bays
        .iter()
        .map(|b| ModuleBayTemplateRequest {
            name: b.name.clone(),
            label: b.label.clone(),
            position: b.position.clone(),
            device_type: device_type_id.to_string(),
        })
        .collect()
}
