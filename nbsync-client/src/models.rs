//! Remote resource models and write requests.
//!
//! Remote models keep every attribute the API returns (`extra`) so the
//! comparator sees the full document. Requests carry foreign keys as bare ids;
//! Nautobot answers with nested objects, which [`crate::compare`] reconciles.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reference to another object as returned by the API: a nested object at
/// `depth >= 1`, a bare id otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectRef {
    Nested {
        id: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Id(String),
}

impl ObjectRef {
    pub fn id(&self) -> &str {
        match self {
            ObjectRef::Nested { id, .. } => id,
            ObjectRef::Id(id) => id,
        }
    }
}

/// A remote resource type and where it lives.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name used in log fields and report keys, e.g. `Location`.
    const KIND: &'static str;
    /// REST path below the API root, e.g. `dcim/locations`.
    const ENDPOINT: &'static str;
    /// Content type recorded in the change log, e.g. `dcim.location`.
    const OBJECT_TYPE: &'static str;
    /// Lookup-cache collection key. `None` for types that are never cached.
    const CACHE_KEY: Option<&'static str>;
    /// List filter matching [`Resource::name`].
    const NAME_FILTER: &'static str = "name";

    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

/// A resource the engine creates and updates.
pub trait Writable: Resource {
    type Request: Serialize + Send + Sync;

    fn request_name(request: &Self::Request) -> &str;
}

/// A resource nested under a parent of the same type.
pub trait Nested: Resource {
    fn parent_id(&self) -> Option<&str>;
}

/// A component template owned by a device type.
pub trait Template: Writable {}

macro_rules! resource {
    (
        $ty:ty,
        $kind:literal,
        $endpoint:literal,
        $object_type:literal,
        $cache:expr,
        $name:ident $(,)?
    ) => {
        impl Resource for $ty {
            const KIND: &'static str = $kind;
            const ENDPOINT: &'static str = $endpoint;
            const OBJECT_TYPE: &'static str = $object_type;
            const CACHE_KEY: Option<&'static str> = $cache;

            fn id(&self) -> &str {
                &self.id
            }

            fn name(&self) -> &str {
                &self.$name
            }
        }
    };
}

macro_rules! writable {
    ($ty:ty, $request:ty, $name:ident) => {
        impl Writable for $ty {
            type Request = $request;

            fn request_name(request: &$request) -> &str {
                &request.$name
            }
        }
    };
}

macro_rules! nested {
    ($ty:ty) => {
        impl Nested for $ty {
            fn parent_id(&self) -> Option<&str> {
                self.parent.as_ref().map(ObjectRef::id)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Remote models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<ObjectRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<ObjectRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RackGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<ObjectRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rack {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceType {
    pub id: String,
    pub model: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceTemplate {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolePortTemplate {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerPortTemplate {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleBayTemplate {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

resource!(Status, "Status", "extras/statuses", "extras.status", Some("statuses"), name);
resource!(
    Manufacturer,
    "Manufacturer",
    "dcim/manufacturers",
    "dcim.manufacturer",
    Some("manufacturers"),
    name,
);
resource!(
    LocationType,
    "LocationType",
    "dcim/location-types",
    "dcim.locationtype",
    Some("locationtypes"),
    name,
);
resource!(Location, "Location", "dcim/locations", "dcim.location", Some("locations"), name);
resource!(RackGroup, "RackGroup", "dcim/rack-groups", "dcim.rackgroup", Some("rackgroups"), name);
resource!(Rack, "Rack", "dcim/racks", "dcim.rack", Some("racks"), name);
resource!(
    InterfaceTemplate,
    "InterfaceTemplate",
    "dcim/interface-templates",
    "dcim.interfacetemplate",
    None,
    name,
);
resource!(
    ConsolePortTemplate,
    "ConsolePortTemplate",
    "dcim/console-port-templates",
    "dcim.consoleporttemplate",
    None,
    name,
);
resource!(
    PowerPortTemplate,
    "PowerPortTemplate",
    "dcim/power-port-templates",
    "dcim.powerporttemplate",
    None,
    name,
);
resource!(
    ModuleBayTemplate,
    "ModuleBayTemplate",
    "dcim/module-bay-templates",
    "dcim.modulebaytemplate",
    None,
    name,
);

impl Resource for DeviceType {
    const KIND: &'static str = "DeviceType";
    const ENDPOINT: &'static str = "dcim/device-types";
    const OBJECT_TYPE: &'static str = "dcim.devicetype";
    const CACHE_KEY: Option<&'static str> = Some("devicetypes");
    const NAME_FILTER: &'static str = "model";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.model
    }
}

nested!(LocationType);
nested!(Location);
nested!(RackGroup);

// ---------------------------------------------------------------------------
// Write requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManufacturerRequest {
    pub name: String,
    pub description: String,
}

/// `parent` is always serialized so that roots compare against `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationTypeRequest {
    pub name: String,
    pub description: String,
    pub content_types: Vec<String>,
    pub nestable: bool,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRequest {
    pub name: String,
    pub description: String,
    pub location_type: String,
    pub status: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RackGroupRequest {
    pub name: String,
    pub description: String,
    pub location: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RackRequest {
    pub name: String,
    pub comments: String,
    pub location: String,
    pub status: String,
    pub u_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<String>,
    pub rack_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceTypeRequest {
    pub model: String,
    pub manufacturer: String,
    pub part_number: String,
    pub u_height: u32,
    pub is_full_depth: bool,
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceTemplateRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub mgmt_only: bool,
    pub device_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolePortTemplateRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub device_type: String,
}

/// Draw values are omitted rather than sent as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerPortTemplateRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_draw: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_draw: Option<u32>,
    pub device_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleBayTemplateRequest {
    pub name: String,
    pub label: String,
    pub position: String,
    pub device_type: String,
}

writable!(Manufacturer, ManufacturerRequest, name);
writable!(LocationType, LocationTypeRequest, name);
writable!(Location, LocationRequest, name);
writable!(RackGroup, RackGroupRequest, name);
writable!(Rack, RackRequest, name);
writable!(DeviceType, DeviceTypeRequest, model);
writable!(InterfaceTemplate, InterfaceTemplateRequest, name);
writable!(ConsolePortTemplate, ConsolePortTemplateRequest, name);
writable!(PowerPortTemplate, PowerPortTemplateRequest, name);
writable!(ModuleBayTemplate, ModuleBayTemplateRequest, name);

impl Template for InterfaceTemplate {}
impl Template for ConsolePortTemplate {}
impl Template for PowerPortTemplate {}
impl Template for ModuleBayTemplate {}
