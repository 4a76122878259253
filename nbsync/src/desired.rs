//! Desired-state documents.
//!
//! Location types, locations, rack groups and racks are written as YAML lists
//! (nesting types carry `children`). A device-type document describes exactly
//! one device type.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, SyncError};

/// One desired entity. The name is its only portable identity.
pub trait DesiredNode: DeserializeOwned + Send + Sync {
    fn name(&self) -> &str;

    fn children(&self) -> &[Self] {
        &[]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationTypeSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content_types: Vec<String>,
    #[serde(default)]
    pub nestable: bool,
    #[serde(default)]
    pub children: Vec<LocationTypeSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub location_type: String,
    pub status: String,
    #[serde(default)]
    pub children: Vec<LocationSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RackGroupSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub children: Vec<RackGroupSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RackSpec {
    pub name: String,
    #[serde(default)]
    pub facility: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub rack_group: String,
    pub status: String,
    #[serde(default)]
    pub u_height: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceTypeSpec {
    pub manufacturer: String,
    pub model: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub u_height: u32,
    #[serde(default)]
    pub is_full_depth: bool,
    #[serde(default)]
    pub comments: String,
    #[serde(default, rename = "interfaces")]
    pub interfaces: Vec<InterfaceSpec>,
    #[serde(default, rename = "console-ports")]
    pub console_ports: Vec<ConsolePortSpec>,
    #[serde(default, rename = "power-ports")]
    pub power_ports: Vec<PowerPortSpec>,
    #[serde(default, rename = "module-bays")]
    pub module_bays: Vec<ModuleBaySpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub mgmt_only: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsolePortSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowerPortSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub maximum_draw: i64,
    #[serde(default)]
    pub allocated_draw: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleBaySpec {
    pub name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub label: String,
}

impl DesiredNode for LocationTypeSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

impl DesiredNode for LocationSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

impl DesiredNode for RackGroupSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

impl DesiredNode for RackSpec {
    fn name(&self) -> &str {
        &self.name
    }
}

impl DesiredNode for DeviceTypeSpec {
    fn name(&self) -> &str {
        &self.model
    }
}

/// How the documents of a type are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// Each document is a list of nodes.
    List,
    /// Each document is a single node.
    Single,
}

/// Parse every document in key order. Blank documents contribute nothing.
/// The first failure aborts with the offending document's key.
pub fn parse_documents<T: DesiredNode>(
    documents: &BTreeMap<String, String>,
    shape: DocumentShape,
) -> Result<Vec<T>> {
    let mut nodes = Vec::new();

    for (key, raw) in documents {
        if raw.trim().is_empty() {
            continue;
        }
        let parse_error = |source| SyncError::Parse {
            document: key.clone(),
            source,
        };
        match shape {
            DocumentShape::List => {
                let parsed: Option<Vec<T>> = serde_yaml::from_str(raw).map_err(parse_error)?;
                nodes.extend(parsed.unwrap_or_default());
            }
            DocumentShape::Single => {
                let parsed: Option<T> = serde_yaml::from_str(raw).map_err(parse_error)?;
                nodes.extend(parsed);
            }
        }
    }

    Ok(nodes)
}

/// Names of every node in the forest, children included.
pub fn collect_names<T: DesiredNode>(nodes: &[T]) -> BTreeSet<String> {
    fn walk<T: DesiredNode>(nodes: &[T], names: &mut BTreeSet<String>) {
        for node in nodes {
            names.insert(node.name().to_string());
            walk(node.children(), names);
        }
    }

    let mut names = BTreeSet::new();
    walk(nodes, &mut names);
    names
}
