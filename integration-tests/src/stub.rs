use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::routing::get;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

type Reply = (StatusCode, Json<Value>);

/// How the stub deviates from the well-behaved service.
#[derive(Clone, Debug)]
pub struct StubBehavior {
    /// Delete confirmation template; `{id}` is replaced with the id.
    pub delete_message: String,
    /// Answer every create with a 500.
    pub reject_creates: bool,
    /// Raw body served for the listing instead of the seeded objects.
    pub list_body: Option<String>,
}

impl Default for StubBehavior {
    fn default() -> Self {
        Self {
            delete_message: "Object with id = {id} has been deleted.".to_string(),
            reject_creates: false,
            list_body: None,
        }
    }
}

/// Method and path of a request the stub received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
}

#[derive(Clone)]
struct StubState {
    behavior: Arc<StubBehavior>,
    seeded: Arc<Vec<Value>>,
    objects: Arc<Mutex<HashMap<String, Value>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Handle for a running stub server; the server stops when dropped.
pub struct ObjectsStubHandle {
    base_url: String,
    join: JoinHandle<()>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ObjectsStubHandle {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map_or_else(|_| Vec::new(), |entries| entries.clone())
    }
}

impl Drop for ObjectsStubHandle {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// Spawn a stub seeded with the 13 reference objects.
pub async fn spawn_objects_stub(behavior: StubBehavior) -> Result<ObjectsStubHandle, String> {
    let seeded = seed_objects();
    let objects: HashMap<String, Value> = seeded
        .iter()
        .map(|object| (object["id"].as_str().unwrap_or_default().to_string(), object.clone()))
        .collect();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        behavior: Arc::new(behavior),
        seeded: Arc::new(seeded),
        objects: Arc::new(Mutex::new(objects)),
        requests: Arc::clone(&requests),
    };

    let app = Router::new()
        .route("/objects", get(list_objects).post(create_object))
        .route(
            "/objects/{id}",
            get(read_object).put(update_object).delete(delete_object),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("objects stub bind failed: {err}"))?;
    let base_url = format!("http://{}", listener.local_addr().map_err(|err| err.to_string())?);
    let join = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(ObjectsStubHandle {
        base_url,
        join,
        requests,
    })
}

async fn list_objects(State(state): State<StubState>) -> (StatusCode, String) {
    record(&state, Method::GET, "/objects".to_string());
    let body = match &state.behavior.list_body {
        Some(raw) => raw.clone(),
        None => Value::Array(state.seeded.as_ref().clone()).to_string(),
    };
    (StatusCode::OK, body)
}

async fn create_object(State(state): State<StubState>, Json(request): Json<Value>) -> Reply {
    record(&state, Method::POST, "/objects".to_string());
    if state.behavior.reject_creates {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "create disabled");
    }

    let id = uuid::Uuid::new_v4().simple().to_string();
    let object = json!({
        "id": id,
        "name": request["name"],
        "data": request["data"],
    });
    store(&state, &id, object.clone());

    let mut receipt = object;
    receipt["createdAt"] = json!(chrono::Utc::now().to_rfc3339());
    (StatusCode::OK, Json(receipt))
}

async fn read_object(State(state): State<StubState>, Path(id): Path<String>) -> Reply {
    record(&state, Method::GET, format!("/objects/{id}"));
    match lookup(&state, &id) {
        Some(object) => (StatusCode::OK, Json(object)),
        None => not_found(&id),
    }
}

async fn update_object(
    State(state): State<StubState>,
    Path(id): Path<String>,
    Json(request): Json<Value>,
) -> Reply {
    record(&state, Method::PUT, format!("/objects/{id}"));
    if lookup(&state, &id).is_none() {
        return not_found(&id);
    }

    let object = json!({
        "id": id,
        "name": request["name"],
        "data": request["data"],
    });
    store(&state, &id, object.clone());

    let mut receipt = object;
    receipt["updatedAt"] = json!(chrono::Utc::now().to_rfc3339());
    (StatusCode::OK, Json(receipt))
}

async fn delete_object(State(state): State<StubState>, Path(id): Path<String>) -> Reply {
    record(&state, Method::DELETE, format!("/objects/{id}"));
    let removed = state
        .objects
        .lock()
        .ok()
        .and_then(|mut objects| objects.remove(&id));
    match removed {
        Some(_) => {
            let message = state.behavior.delete_message.replace("{id}", &id);
            (StatusCode::OK, Json(json!({ "message": message })))
        }
        None => not_found(&id),
    }
}

fn record(state: &StubState, method: Method, path: String) {
    let Ok(mut guard) = state.requests.lock() else {
        return;
    };
    guard.push(RecordedRequest { method, path });
}

fn lookup(state: &StubState, id: &str) -> Option<Value> {
    state
        .objects
        .lock()
        .ok()
        .and_then(|objects| objects.get(id).cloned())
}

fn store(state: &StubState, id: &str, object: Value) {
    if let Ok(mut objects) = state.objects.lock() {
        objects.insert(id.to_string(), object);
    }
}

fn not_found(id: &str) -> Reply {
    error(
        StatusCode::NOT_FOUND,
        &format!("Object with id={id} was not found."),
    )
}

fn error(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "error": message })))
}

fn seed_objects() -> Vec<Value> {
    vec![
        json!({"id": "1", "name": "Google Pixel 6 Pro", "data": {"color": "Cloudy White", "capacity": "128 GB"}}),
        json!({"id": "2", "name": "Apple iPhone 12 Mini, 256GB, Blue", "data": null}),
        json!({"id": "3", "name": "Apple iPhone 12 Pro Max", "data": {"color": "Cloudy White", "capacity": "512 GB"}}),
        json!({"id": "4", "name": "Apple iPhone 11, 64GB", "data": {"color": "Purple", "capacity": "64 GB"}}),
        json!({"id": "5", "name": "Samsung Galaxy Z Fold2", "data": {"color": "Brown", "capacity": "256 GB"}}),
        json!({"id": "6", "name": "Apple AirPods", "data": {"color": "White", "capacity": "n/a", "generation": "3rd"}}),
        json!({"id": "7", "name": "Apple MacBook Pro 16", "data": {"color": "Space Gray", "capacity": "1 TB", "year": 2019}}),
        json!({"id": "8", "name": "Apple Watch Series 8", "data": {"color": "Midnight", "capacity": "32 GB", "Strap Colour": "Elderberry"}}),
        json!({"id": "9", "name": "Beats Studio3 Wireless"}),
        json!({"id": "10", "name": "Apple iPad Mini 5th Gen", "data": {"color": "Silver", "capacity": "64 GB"}}),
        json!({"id": "11", "name": "Apple iPad Mini 5th Gen", "data": {"color": "Silver", "capacity": "254 GB"}}),
        json!({"id": "12", "name": "Apple iPad Air", "data": {"color": "Space Gray", "capacity": "32 GB", "Generation": "4th"}}),
        json!({"id": "13", "name": "Apple iPad Air", "data": null}),
    ]
}

/// Handle for a listener that accepts connections and never answers.
pub struct SilentServerHandle {
    base_url: String,
    join: JoinHandle<()>,
}

impl SilentServerHandle {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for SilentServerHandle {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// Spawn a listener whose connections stay open without a response.
pub async fn spawn_silent_server() -> Result<SilentServerHandle, String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("silent server bind failed: {err}"))?;
    let base_url = format!("http://{}", listener.local_addr().map_err(|err| err.to_string())?);
    let join = tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            open.push(stream);
        }
    });
    Ok(SilentServerHandle { base_url, join })
}
