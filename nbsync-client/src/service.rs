//! Per-resource CRUD on top of [`NautobotClient`].
//!
//! Every operation reports its own failures (operation key, identifiers, error
//! and raw response body) and hands back a sentinel, so synchronizers can keep
//! going with the next resource. Successful writes keep the lookup cache in
//! step with the remote.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, info};

use crate::client::NautobotClient;
use crate::error::ClientError;
use crate::models::{Resource, Template, Writable};
use crate::pagination::paginated_list_with_ids;

/// Depth requested on list calls: foreign keys come back as nested objects.
const LIST_DEPTH: &str = "1";

/// CRUD for one resource type.
pub struct Service<R> {
    client: Arc<NautobotClient>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for Service<R> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> Service<R> {
    pub fn new(client: Arc<NautobotClient>) -> Self {
        Self {
            client,
            _resource: PhantomData,
        }
    }

    pub fn client(&self) -> &NautobotClient {
        &self.client
    }

    fn report_failure(
        &self,
        operation: &str,
        message: &str,
        fields: &[(&str, &str)],
        e: &ClientError,
    ) {
        let error = e.to_string();
        let mut line = fields.to_vec();
        line.push(("error", error.as_str()));
        line.push(("response_body", e.response_body()));
        self.client.report().add_fields(operation, message, &line);
    }

    /// Look up by name: the cached collection first, then a name-filtered
    /// query whose hit is added to the cache. `None` when absent or when the
    /// query failed (reported).
    pub async fn get_by_name(&self, name: &str) -> Option<R> {
        if let Some(key) = R::CACHE_KEY {
            if let Some(found) = self.client.cache().find_by_name(key, name, R::name) {
                debug!(kind = R::KIND, name, "cache hit");
                return Some(found);
            }
        }

        let query = [(R::NAME_FILTER, name.to_string()), ("depth", LIST_DEPTH.to_string())];
        match self.client.list::<R>(R::ENDPOINT, &query).await {
            Ok(results) => {
                let found = results.into_iter().find(|r| !r.id().is_empty() && r.name() == name);
                match (&found, R::CACHE_KEY) {
                    (Some(item), Some(key)) => {
                        self.client.cache().add_to_collection(key, item.clone())
                    }
                    (None, _) => debug!(kind = R::KIND, name, "not found"),
                    _ => {}
                }
                found
            }
            Err(e) => {
                self.report_failure(
                    &format!("get{}ByName", R::KIND),
                    "failed to get by name",
                    &[("name", name)],
                    &e,
                );
                None
            }
        }
    }

    /// Every live object of this type the engine created.
    pub async fn list_all(&self) -> Vec<R> {
        let ids = self.client.managed_ids(R::OBJECT_TYPE, None).await;
        self.list_ids(&format!("listAll{}", R::KIND), &ids, &[]).await
    }

    /// Children of `parent_id`, managed or not. `None` if the query failed
    /// (reported).
    pub async fn list_children(&self, parent_id: &str) -> Option<Vec<R>> {
        let query = [("parent", parent_id.to_string()), ("depth", LIST_DEPTH.to_string())];
        match self.client.list::<R>(R::ENDPOINT, &query).await {
            Ok(children) => Some(children),
            Err(e) => {
                self.report_failure(
                    &format!("list{}Children", R::KIND),
                    "failed to list children",
                    &[("parent_id", parent_id)],
                    &e,
                );
                None
            }
        }
    }

    async fn list_ids(
        &self,
        operation: &str,
        ids: &[String],
        filters: &[(&'static str, &str)],
    ) -> Vec<R> {
        let client = &self.client;
        paginated_list_with_ids(
            client.report(),
            operation,
            ids,
            client.config().batch_size,
            filters,
            |batch| {
                let mut query: Vec<(&str, String)> =
                    batch.into_iter().map(|id| ("id", id)).collect();
                query.extend(filters.iter().map(|(k, v)| (*k, v.to_string())));
                query.push(("depth", LIST_DEPTH.to_string()));
                async move { client.list::<R>(R::ENDPOINT, &query).await }
            },
        )
        .await
    }

    /// Delete object `id`. Returns `false` on failure (reported).
    pub async fn destroy(&self, id: &str) -> bool {
        match self.client.destroy(R::ENDPOINT, id).await {
            Ok(()) => {
                info!(kind = R::KIND, id, "destroyed");
                if let Some(key) = R::CACHE_KEY {
                    self.client
                        .cache()
                        .remove_from_collection(key, |r: &R| r.id() == id);
                }
                true
            }
            Err(e) => {
                self.report_failure(
                    &format!("destroy{}", R::KIND),
                    "failed to destroy",
                    &[("id", id)],
                    &e,
                );
                false
            }
        }
    }
}

impl<R: Writable> Service<R> {
    /// Create an object. `None` on failure (reported).
    pub async fn create(&self, request: &R::Request) -> Option<R> {
        let name = R::request_name(request);
        match self.client.create::<_, R>(R::ENDPOINT, request).await {
            Ok(created) => {
                info!(kind = R::KIND, name, id = created.id(), "created");
                if let Some(key) = R::CACHE_KEY {
                    self.client.cache().add_to_collection(key, created.clone());
                }
                Some(created)
            }
            Err(e) => {
                self.report_failure(
                    &format!("create{}", R::KIND),
                    "failed to create",
                    &[("name", name)],
                    &e,
                );
                None
            }
        }
    }

    /// Replace object `id`. `None` on failure (reported).
    pub async fn update(&self, id: &str, request: &R::Request) -> Option<R> {
        let name = R::request_name(request);
        match self.client.update::<_, R>(R::ENDPOINT, id, request).await {
            Ok(updated) => {
                info!(kind = R::KIND, name, id, "updated");
                if let Some(key) = R::CACHE_KEY {
                    self.client
                        .cache()
                        .update_in_collection(key, updated.clone(), |r: &R| r.id() == id);
                }
                Some(updated)
            }
            Err(e) => {
                self.report_failure(
                    &format!("update{}", R::KIND),
                    "failed to update",
                    &[("id", id), ("name", name)],
                    &e,
                );
                None
            }
        }
    }
}

impl<R: Template> Service<R> {
    /// Managed templates belonging to device type `device_type_id`.
    pub async fn list_by_device_type(&self, device_type_id: &str) -> Vec<R> {
        let ids = self
            .client
            .managed_ids(R::OBJECT_TYPE, Some(device_type_id))
            .await;
        self.list_ids(
            &format!("listAll{}ByDeviceType", R::KIND),
            &ids,
            &[("device_type", device_type_id)],
        )
        .await
    }
}
