//! nbsync-client: Nautobot REST client used by the nbsync reconciler.
//!
//! Besides plain HTTP plumbing this crate owns the pieces every resource
//! synchronizer leans on:
//! - [`Report`]: per-cycle log of non-fatal remote failures
//! - [`LookupCache`]: typed, TTL-bounded collection cache keyed by resource type
//! - [`compare`]: subset comparison that tolerates nested-vs-primitive shapes
//! - [`pagination`]: batched `id=` listing that survives failed batches
//! - [`Service`]: get/list/create/update/destroy for one resource type
//!
//! # Example
//! ```ignore
//! use nbsync_client::{ClientConfig, NautobotClient, Service, models::Location};
//!
//! let client = Arc::new(NautobotClient::new(ClientConfig::new(url, "nbsync", token), cancel)?);
//! client.preload_cache().await;
//! let locations: Service<Location> = Service::new(client.clone());
//! let dc = locations.get_by_name("DFW3").await;
//! ```

pub mod cache;
mod changes;
mod client;
pub mod compare;
pub mod error;
pub mod models;
pub mod pagination;
mod report;
mod service;

pub use cache::LookupCache;
pub use changes::ObjectChange;
pub use client::{ClientConfig, NautobotClient};
pub use error::{ClientError, Result};
pub use report::Report;
pub use service::Service;
