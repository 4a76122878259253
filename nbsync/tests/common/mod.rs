//! Shared test utilities for nbsync integration tests.
//!
//! [`FakeNautobot`] serves the slice of the Nautobot REST and GraphQL API the
//! engine uses, backed by an in-memory store:
//! - list endpoints filter on `id` (repeatable), `name`, `model`, `parent`,
//!   `device_type` and page through `next` links
//! - foreign keys are stored as bare ids and rendered as nested
//!   `{id, name}` objects; `type` choices render as `{value, label}`
//! - every create/delete by the API user lands in the change log
//! - deleting an object that still has children fails with 409

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use nbsync::{Controller, ControllerConfig};
use nbsync_client::{ClientConfig, NautobotClient};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const USER: &str = "nbsync";

/// Fields holding a reference to another object.
const FOREIGN_KEYS: &[&str] = &[
    "parent",
    "location_type",
    "status",
    "location",
    "rack_group",
    "manufacturer",
    "device_type",
];

/// One request the fake served.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub endpoint: String,
    /// Object name (or model) for writes.
    pub name: Option<String>,
}

struct Store {
    base_url: String,
    objects: BTreeMap<String, Vec<Value>>,
    changes: Vec<Value>,
    calls: Vec<Call>,
    failures: BTreeSet<(&'static str, String)>,
    page_size: usize,
    cancel_on_delete: Option<(String, CancellationToken)>,
}

type Shared = Arc<Mutex<Store>>;

/// Fake Nautobot server wrapper.
pub struct FakeNautobot {
    pub addr: SocketAddr,
    store: Shared,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeNautobot {
    /// Spawn a server with the `Active` and `Planned` statuses seeded.
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let store = Arc::new(Mutex::new(Store {
            base_url: format!("http://{}/api", addr),
            objects: BTreeMap::new(),
            changes: Vec::new(),
            calls: Vec::new(),
            failures: BTreeSet::new(),
            page_size: 1000,
            cancel_on_delete: None,
        }));

        let router = Router::new()
            .route("/api/graphql/", post(graphql))
            .route("/api/{group}/{resource}/", get(list).post(create))
            .route(
                "/api/{group}/{resource}/{id}/",
                get(retrieve).put(update).delete(destroy),
            )
            .with_state(Arc::clone(&store));

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        let fake = Self {
            addr,
            store,
            shutdown_tx: Some(shutdown_tx),
        };
        fake.seed("extras/statuses", json!({"name": "Active"}));
        fake.seed("extras/statuses", json!({"name": "Planned"}));
        fake
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url(), USER, Some("0123456789abcdef".to_string()))
    }

    pub fn client(&self) -> Arc<NautobotClient> {
        self.client_with(CancellationToken::new())
    }

    pub fn client_with(&self, cancel: CancellationToken) -> Arc<NautobotClient> {
        Arc::new(NautobotClient::new(self.client_config(), cancel).expect("client"))
    }

    pub fn controller(&self) -> Controller {
        self.controller_with(CancellationToken::new())
    }

    pub fn controller_with(&self, cancel: CancellationToken) -> Controller {
        Controller::new(ControllerConfig::new(self.client_config()), cancel)
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    /// Insert an object without a change-log entry (not managed by nbsync).
    pub fn seed(&self, endpoint: &str, object: Value) -> String {
        self.lock().insert(endpoint, object, None)
    }

    /// Insert an object as if nbsync had created it.
    pub fn seed_managed(&self, endpoint: &str, object: Value) -> String {
        self.lock().insert(endpoint, object, Some(USER))
    }

    /// Stored objects of `endpoint`, foreign keys as bare ids.
    pub fn objects(&self, endpoint: &str) -> Vec<Value> {
        self.lock().objects.get(endpoint).cloned().unwrap_or_default()
    }

    pub fn names(&self, endpoint: &str) -> Vec<String> {
        self.objects(endpoint)
            .iter()
            .map(|o| name_of(o).to_string())
            .collect()
    }

    pub fn find(&self, endpoint: &str, name: &str) -> Option<Value> {
        self.objects(endpoint).into_iter().find(|o| name_of(o) == name)
    }

    pub fn id_of(&self, endpoint: &str, name: &str) -> String {
        self.find(endpoint, name)
            .and_then(|o| o["id"].as_str().map(str::to_string))
            .unwrap_or_else(|| panic!("{endpoint}: {name} not found"))
    }

    /// Make the next and all following `method` requests touching the object
    /// called `name` fail with 500.
    pub fn fail_on(&self, method: &'static str, name: &str) {
        self.lock().failures.insert((method, name.to_string()));
    }

    /// Make every list request on `endpoint` fail with 500.
    pub fn fail_list(&self, endpoint: &str) {
        self.lock().failures.insert(("GET", endpoint.to_string()));
    }

    /// Cancel `token` once the object called `name` has been deleted.
    pub fn cancel_on_delete(&self, name: &str, token: CancellationToken) {
        self.lock().cancel_on_delete = Some((name.to_string(), token));
    }

    /// Overwrite one stored field of the object called `name`.
    pub fn patch(&self, endpoint: &str, name: &str, field: &str, value: Value) {
        let mut store = self.lock();
        if let Some(object) = store
            .objects
            .get_mut(endpoint)
            .and_then(|objects| objects.iter_mut().find(|o| name_of(o) == name))
        {
            object[field] = value;
        }
    }

    pub fn set_page_size(&self, size: usize) {
        self.lock().page_size = size;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Writes (POST/PUT/DELETE on REST endpoints) served so far.
    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method != "GET" && c.endpoint != "graphql")
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Position of the first `method` call on `name` in the call log.
    pub fn position(&self, method: &str, name: &str) -> Option<usize> {
        self.calls()
            .iter()
            .position(|c| c.method == method && c.name.as_deref() == Some(name))
    }
}

impl Drop for FakeNautobot {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn name_of(object: &Value) -> &str {
    object["name"]
        .as_str()
        .or_else(|| object["model"].as_str())
        .unwrap_or("")
}

fn object_type(endpoint: &str) -> String {
    let (group, resource) = endpoint.split_once('/').unwrap_or(("", endpoint));
    let singular = match resource {
        "statuses" => "status".to_string(),
        other => other.trim_end_matches('s').replace('-', ""),
    };
    format!("{}.{}", group, singular)
}

impl Store {
    fn insert(&mut self, endpoint: &str, mut object: Value, user: Option<&str>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        object["id"] = json!(id);
        if let Some(user) = user {
            self.log_change(endpoint, &object, user, "CREATE");
        }
        self.objects.entry(endpoint.to_string()).or_default().push(object);
        id
    }

    fn log_change(&mut self, endpoint: &str, object: &Value, user: &str, action: &str) {
        self.changes.push(json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "user_name": user,
            "action": action,
            "request_id": uuid::Uuid::new_v4().to_string(),
            "changed_object_type": object_type(endpoint),
            "changed_object_id": object["id"],
            "related_object_id": object.get("device_type").cloned().unwrap_or(Value::Null),
        }));
    }

    fn lookup(&self, id: &str) -> Option<&Value> {
        self.objects
            .values()
            .flatten()
            .find(|o| o["id"].as_str() == Some(id))
    }

    fn render(&self, object: &Value) -> Value {
        let mut rendered = object.clone();
        if let Some(fields) = rendered.as_object_mut() {
            for (key, value) in fields.iter_mut() {
                let Some(raw) = value.as_str().map(str::to_string) else {
                    continue;
                };
                if FOREIGN_KEYS.contains(&key.as_str()) {
                    let name = self.lookup(&raw).map(name_of).unwrap_or("");
                    *value = json!({"id": raw, "name": name, "display": name});
                } else if key == "type" {
                    *value = json!({"value": raw, "label": raw.to_uppercase()});
                }
            }
            fields.insert("display".to_string(), json!(name_of(object)));
            fields.insert("created".to_string(), json!("2025-01-01T00:00:00Z"));
        }
        rendered
    }

    fn failing(&self, method: &'static str, name: &str) -> bool {
        self.failures.contains(&(method, name.to_string()))
    }

    fn record(&mut self, method: &'static str, endpoint: &str, name: Option<&str>) {
        self.calls.push(Call {
            method,
            endpoint: endpoint.to_string(),
            name: name.map(str::to_string),
        });
    }
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({"detail": detail}))).into_response()
}

async fn list(
    State(store): State<Shared>,
    Path((group, resource)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let endpoint = format!("{}/{}", group, resource);
    let mut store = store.lock().unwrap();
    store.record("GET", &endpoint, None);
    if store.failing("GET", &endpoint) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "injected failure");
    }

    let ids: BTreeSet<&str> = params
        .iter()
        .filter(|(k, _)| k == "id")
        .map(|(_, v)| v.as_str())
        .collect();
    let offset: usize = params
        .iter()
        .find(|(k, _)| k == "offset")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);

    let matches = |object: &Value| {
        if !ids.is_empty() && !object["id"].as_str().is_some_and(|id| ids.contains(id)) {
            return false;
        }
        params.iter().all(|(key, value)| match key.as_str() {
            "name" | "model" => object[key.as_str()].as_str() == Some(value.as_str()),
            "parent" | "device_type" | "location" => {
                object[key.as_str()].as_str() == Some(value.as_str())
            }
            _ => true,
        })
    };

    let all: Vec<Value> = store
        .objects
        .get(&endpoint)
        .map(|objects| objects.iter().filter(|&o| matches(o)).cloned().collect())
        .unwrap_or_default();
    let count = all.len();
    let page_size = store.page_size;
    let results: Vec<Value> = all
        .iter()
        .skip(offset)
        .take(page_size)
        .map(|o| store.render(o))
        .collect();

    let next = if offset + page_size < count {
        let mut query: Vec<(String, String)> =
            params.iter().filter(|(k, _)| k != "offset").cloned().collect();
        query.push(("offset".to_string(), (offset + page_size).to_string()));
        let url = reqwest::Url::parse_with_params(
            &format!("{}/{}/", store.base_url, endpoint),
            &query,
        )
        .expect("next url");
        json!(url.to_string())
    } else {
        Value::Null
    };

    let page = json!({"count": count, "next": next, "previous": null, "results": results});
    Json(page).into_response()
}

async fn create(
    State(store): State<Shared>,
    Path((group, resource)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let endpoint = format!("{}/{}", group, resource);
    let mut store = store.lock().unwrap();
    let name = name_of(&body).to_string();
    store.record("POST", &endpoint, Some(&name));

    if store.failing("POST", &name) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "injected failure");
    }
    let duplicate = store.objects.get(&endpoint).is_some_and(|objects| {
        objects
            .iter()
            .any(|o| name_of(o) == name && o.get("device_type") == body.get("device_type"))
    });
    if duplicate {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"name": [format!("{} already exists", name)]})),
        )
            .into_response();
    }

    let id = store.insert(&endpoint, body, Some(USER));
    let rendered = store.render(store.lookup(&id).unwrap_or(&Value::Null));
    (StatusCode::CREATED, Json(rendered)).into_response()
}

async fn retrieve(
    State(store): State<Shared>,
    Path((group, resource, id)): Path<(String, String, String)>,
) -> Response {
    let endpoint = format!("{}/{}", group, resource);
    let mut store = store.lock().unwrap();
    store.record("GET", &endpoint, None);
    match store.objects.get(&endpoint).and_then(|o| o.iter().find(|o| o["id"] == id.as_str())) {
        Some(object) => Json(store.render(object)).into_response(),
        None => error(StatusCode::NOT_FOUND, "Not found."),
    }
}

async fn update(
    State(store): State<Shared>,
    Path((group, resource, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let endpoint = format!("{}/{}", group, resource);
    let mut store = store.lock().unwrap();
    let name = name_of(&body).to_string();
    store.record("PUT", &endpoint, Some(&name));

    if store.failing("PUT", &name) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "injected failure");
    }
    let Some(object) = store
        .objects
        .get_mut(&endpoint)
        .and_then(|objects| objects.iter_mut().find(|o| o["id"] == id.as_str()))
    else {
        return error(StatusCode::NOT_FOUND, "Not found.");
    };

    let mut replaced: Map<String, Value> = body.as_object().cloned().unwrap_or_default();
    replaced.insert("id".to_string(), json!(id));
    *object = Value::Object(replaced);
    let rendered = store.render(store.lookup(&id).unwrap_or(&Value::Null));
    Json(rendered).into_response()
}

async fn destroy(
    State(store): State<Shared>,
    Path((group, resource, id)): Path<(String, String, String)>,
) -> Response {
    let endpoint = format!("{}/{}", group, resource);
    let mut store = store.lock().unwrap();

    let Some(object) = store
        .objects
        .get(&endpoint)
        .and_then(|objects| objects.iter().find(|o| o["id"] == id.as_str()))
        .cloned()
    else {
        store.record("DELETE", &endpoint, None);
        return error(StatusCode::NOT_FOUND, "Not found.");
    };
    let name = name_of(&object).to_string();
    store.record("DELETE", &endpoint, Some(&name));

    if store.failing("DELETE", &name) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "injected failure");
    }
    let has_children = store.objects[&endpoint]
        .iter()
        .any(|o| o["parent"].as_str() == Some(id.as_str()));
    if has_children {
        return error(
            StatusCode::CONFLICT,
            concat!(
                "Cannot delete some instances of model because they are referenced ",
                "through protected foreign keys"
            ),
        );
    }

    if let Some(objects) = store.objects.get_mut(&endpoint) {
        objects.retain(|o| o["id"] != id.as_str());
    }
    store.log_change(&endpoint, &object, USER, "DELETE");
    if let Some((_, token)) = store.cancel_on_delete.as_ref().filter(|(n, _)| *n == name) {
        token.cancel();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn graphql(State(store): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut store = store.lock().unwrap();
    store.record("POST", "graphql", None);

    let vars = &body["variables"];
    let object_type = vars["changedObjectType"].as_str().unwrap_or("");
    let users: Vec<&str> = vars["userName"]
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let actions: Vec<String> = vars["action"]
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_uppercase).collect())
        .unwrap_or_default();
    let limit = vars["limit"].as_u64().unwrap_or(100) as usize;
    let offset = vars["offset"].as_u64().unwrap_or(0) as usize;

    let page: Vec<Value> = store
        .changes
        .iter()
        .filter(|c| c["changed_object_type"] == object_type)
        .filter(|c| users.iter().any(|u| c["user_name"] == *u))
        .filter(|c| actions.iter().any(|a| c["action"] == a.as_str()))
        .skip(offset)
        .take(limit)
        .cloned()
        .collect();

    Json(json!({"data": {"object_changes": page}})).into_response()
}

/// Documents keyed by file name.
pub fn docs(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
