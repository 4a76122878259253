//! Racks, rack groups and device types against a fake Nautobot.

mod common;

use std::sync::Arc;

use common::{FakeNautobot, docs};
use nbsync::sync::{DeviceTypeSync, RackGroupSync, RackSync, Synchronizer};
use serde_json::json;

const LOCATIONS: &str = "dcim/locations";
const RACK_GROUPS: &str = "dcim/rack-groups";
const RACKS: &str = "dcim/racks";
const MANUFACTURERS: &str = "dcim/manufacturers";
const DEVICE_TYPES: &str = "dcim/device-types";
const INTERFACES: &str = "dcim/interface-templates";
const POWER_PORTS: &str = "dcim/power-port-templates";
const MODULE_BAYS: &str = "dcim/module-bay-templates";

const RACKS_YAML: &str = r#"
- name: r1
  facility: F-101
  description: first row
  location: DFW3
  rack_group: Row A
  status: Active
  u_height: 48
- name: r2
  location: DFW3
  status: Planned
  u_height: 42
"#;

const DEVICE_TYPE_YAML: &str = r#"
manufacturer: Dell
model: PowerEdge R7615
part_number: R7615
u_height: 2
is_full_depth: true
interfaces:
  - name: eth0
    type: 25gbase-x-sfp28
  - name: eth1
    type: 25gbase-x-sfp28
  - name: idrac
    type: 1000base-t
    mgmt_only: true
console-ports:
  - name: Serial
    type: de-9
power-ports:
  - name: PSU1
    type: iec-60320-c14
    maximum_draw: 1100
  - name: PSU2
    type: iec-60320-c14
module-bays:
  - name: Slot 1
    position: "1"
    label: PCIe
"#;

fn seed_site(fake: &FakeNautobot) -> String {
    let location = fake.seed(LOCATIONS, json!({"name": "DFW3", "parent": null}));
    fake.seed(RACK_GROUPS, json!({"name": "Row A", "location": location, "parent": null}));
    location
}

#[tokio::test]
async fn test_racks_resolve_references() {
    let fake = FakeNautobot::spawn().await;
    let location = seed_site(&fake);

    let summary = RackSync::new(fake.client())
        .sync_all(&docs(&[("racks.yaml", RACKS_YAML)]))
        .await
        .unwrap();
    assert_eq!(summary.created, 2);

    let r1 = fake.find(RACKS, "r1").unwrap();
    assert_eq!(r1["location"], json!(location));
    assert_eq!(r1["rack_group"], json!(fake.id_of(RACK_GROUPS, "Row A")));
    assert_eq!(r1["facility_id"], json!("F-101"));
    assert_eq!(r1["comments"], json!("first row"));
    assert_eq!(r1["u_height"], json!(48));

    let r2 = fake.find(RACKS, "r2").unwrap();
    assert_eq!(r2["rack_group"], json!(null));
    assert!(r2.get("facility_id").is_none());
    assert_eq!(r2["status"], json!(fake.id_of("extras/statuses", "Planned")));

    fake.clear_calls();
    let again = RackSync::new(fake.client())
        .sync_all(&docs(&[("racks.yaml", RACKS_YAML)]))
        .await
        .unwrap();
    assert_eq!(again.unchanged, 2);
    assert!(fake.writes().is_empty());
}

#[tokio::test]
async fn test_racks_missing_group_and_obsolete_deletion() {
    let fake = FakeNautobot::spawn().await;
    seed_site(&fake);
    RackSync::new(fake.client())
        .sync_all(&docs(&[("racks.yaml", RACKS_YAML)]))
        .await
        .unwrap();

    let client = fake.client();
    let yaml = r#"
- name: r1
  location: DFW3
  rack_group: Row Z
  status: Active
"#;
    let summary = RackSync::new(Arc::clone(&client))
        .sync_all(&docs(&[("racks.yaml", yaml)]))
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(fake.names(RACKS), vec!["r1"]);
    let report = client.report().snapshot();
    assert!(report["syncRack"][0].contains("rack group Row Z not found"));
}

#[tokio::test]
async fn test_rack_group_tree_under_location() {
    let fake = FakeNautobot::spawn().await;
    let location = fake.seed(LOCATIONS, json!({"name": "ORD1", "parent": null}));

    let yaml = r#"
- name: Hall 1
  location: ORD1
  children:
    - name: Row 1
      location: ORD1
"#;
    let summary = RackGroupSync::new(fake.client())
        .sync_all(&docs(&[("groups.yaml", yaml)]))
        .await
        .unwrap();
    assert_eq!(summary.created, 2);

    let row = fake.find(RACK_GROUPS, "Row 1").unwrap();
    assert_eq!(row["parent"], json!(fake.id_of(RACK_GROUPS, "Hall 1")));
    assert_eq!(row["location"], json!(location));
}

#[tokio::test]
async fn test_device_type_with_templates() {
    let fake = FakeNautobot::spawn().await;

    let summary = DeviceTypeSync::new(fake.client())
        .sync_all(&docs(&[("r7615.yaml", DEVICE_TYPE_YAML)]))
        .await
        .unwrap();
    assert_eq!(summary.failed, 0);
    // Device type plus seven templates.
    assert_eq!(summary.created, 8);

    let dell = fake.find(MANUFACTURERS, "Dell").unwrap();
    assert_eq!(dell["description"], json!("Dell"));

    let device_type = fake.find(DEVICE_TYPES, "PowerEdge R7615").unwrap();
    let id = device_type["id"].as_str().unwrap().to_string();
    assert_eq!(device_type["manufacturer"], dell["id"]);
    assert_eq!(device_type["is_full_depth"], json!(true));

    assert_eq!(fake.names(INTERFACES), vec!["eth0", "eth1", "idrac"]);
    assert!(fake.objects(INTERFACES).iter().all(|i| i["device_type"] == json!(id)));
    assert_eq!(fake.find(INTERFACES, "idrac").unwrap()["mgmt_only"], json!(true));

    let psu1 = fake.find(POWER_PORTS, "PSU1").unwrap();
    assert_eq!(psu1["maximum_draw"], json!(1100));
    assert!(psu1.get("allocated_draw").is_none());
    assert!(fake.find(POWER_PORTS, "PSU2").unwrap().get("maximum_draw").is_none());

    let bay = fake.find(MODULE_BAYS, "Slot 1").unwrap();
    assert_eq!(bay["label"], json!("PCIe"));
    assert_eq!(bay["position"], json!("1"));

    fake.clear_calls();
    let again = DeviceTypeSync::new(fake.client())
        .sync_all(&docs(&[("r7615.yaml", DEVICE_TYPE_YAML)]))
        .await
        .unwrap();
    assert_eq!(again.unchanged, 8);
    assert!(fake.writes().is_empty(), "unexpected writes: {:?}", fake.writes());
}

#[tokio::test]
async fn test_templates_updated_and_pruned_per_device_type() {
    let fake = FakeNautobot::spawn().await;
    DeviceTypeSync::new(fake.client())
        .sync_all(&docs(&[("r7615.yaml", DEVICE_TYPE_YAML)]))
        .await
        .unwrap();
    let device_type = fake.id_of(DEVICE_TYPES, "PowerEdge R7615");
    fake.seed(
        INTERFACES,
        json!({"name": "bmc-extra", "type": "1000base-t", "device_type": device_type}),
    );
    fake.clear_calls();

    let changed = DEVICE_TYPE_YAML
        .replace("  - name: eth1\n    type: 25gbase-x-sfp28\n", "")
        .replace(
            "name: eth0\n    type: 25gbase-x-sfp28",
            "name: eth0\n    type: 100gbase-x-qsfp28",
        );
    let summary = DeviceTypeSync::new(fake.client())
        .sync_all(&docs(&[("r7615.yaml", &changed)]))
        .await
        .unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(fake.names(INTERFACES), vec!["eth0", "idrac", "bmc-extra"]);
    assert_eq!(
        fake.find(INTERFACES, "eth0").unwrap()["type"],
        json!("100gbase-x-qsfp28")
    );
    assert!(fake.position("DELETE", "eth1").is_some());
    assert!(fake.position("DELETE", "bmc-extra").is_none());
}

#[tokio::test]
async fn test_obsolete_device_type_deleted() {
    let fake = FakeNautobot::spawn().await;
    let other = DEVICE_TYPE_YAML.replace("model: PowerEdge R7615", "model: PowerEdge R6615");
    DeviceTypeSync::new(fake.client())
        .sync_all(&docs(&[("r6615.yaml", &other), ("r7615.yaml", DEVICE_TYPE_YAML)]))
        .await
        .unwrap();
    assert_eq!(fake.names(DEVICE_TYPES).len(), 2);

    let summary = DeviceTypeSync::new(fake.client())
        .sync_all(&docs(&[("r7615.yaml", DEVICE_TYPE_YAML)]))
        .await
        .unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(fake.names(DEVICE_TYPES), vec!["PowerEdge R7615"]);
    // The manufacturer is shared and never pruned.
    assert!(fake.find(MANUFACTURERS, "Dell").is_some());
}
