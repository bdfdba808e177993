use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

/// Behaviour switches for the mock server.
#[derive(Clone, Debug)]
pub struct MockOptions {
    pub admin_user: String,
    pub admin_password: String,
    /// Answer 500 to a database `PUT` that did create the database, as
    /// CouchDB does under COUCHDB-2946.
    pub quirk_500_on_create: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            admin_user: "admin".to_string(),
            admin_password: "password".to_string(),
            quirk_500_on_create: false,
        }
    }
}

#[derive(Clone, Debug)]
struct StoredDoc {
    generation: u64,
    rev: String,
    fields: Map<String, Value>,
    deleted: bool,
}

#[derive(Default, Debug)]
struct Database {
    docs: HashMap<String, StoredDoc>,
}

#[derive(Clone)]
pub struct AppState {
    dbs: Arc<RwLock<BTreeMap<String, Database>>>,
    options: Arc<MockOptions>,
}

type Reply = (StatusCode, Json<Value>);

pub fn app() -> Router {
    app_with(MockOptions::default())
}

pub fn app_with(options: MockOptions) -> Router {
    let state = AppState {
        dbs: Arc::new(RwLock::new(BTreeMap::new())),
        options: Arc::new(options),
    };
    Router::new()
        .route("/_all_dbs", get(all_dbs))
        .route("/_uuids", get(uuids))
        .route("/{db}", get(db_info).put(create_db).delete(delete_db))
        .route("/{db}/{id}", get(get_doc).put(put_doc).delete(delete_doc))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, MockOptions::default()).await
}

pub async fn run_with(listener: TcpListener, options: MockOptions) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(options)).await
}

fn reply(status: StatusCode, body: Value) -> Reply {
    (status, Json(body))
}

fn error(status: StatusCode, error: &str, reason: &str) -> Reply {
    reply(status, json!({ "error": error, "reason": reason }))
}

fn db_missing() -> Reply {
    error(StatusCode::NOT_FOUND, "not_found", "Database does not exist.")
}

fn conflict() -> Reply {
    error(StatusCode::CONFLICT, "conflict", "Document update conflict.")
}

fn unauthorized() -> Reply {
    error(StatusCode::UNAUTHORIZED, "unauthorized", "You are not a server admin.")
}

fn new_rev(generation: u64) -> String {
    format!("{generation}-{}", Uuid::new_v4().simple())
}

fn is_admin(headers: &HeaderMap, options: &MockOptions) -> bool {
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded) else {
        return false;
    };
    let expected = format!("{}:{}", options.admin_user, options.admin_password);
    decoded == expected.as_bytes()
}

/// CouchDB database names: lowercase letter first, then `[a-z0-9_$()+/-]`.
pub fn valid_db_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(c))
}

// --- server ---

async fn all_dbs(State(state): State<AppState>) -> Reply {
    let dbs = state.dbs.read().await;
    let names: Vec<&String> = dbs.keys().collect();
    reply(StatusCode::OK, json!(names))
}

async fn uuids() -> Reply {
    reply(StatusCode::OK, json!({ "uuids": [Uuid::new_v4().simple().to_string()] }))
}

// --- databases ---

async fn db_info(State(state): State<AppState>, Path(db): Path<String>) -> Reply {
    let dbs = state.dbs.read().await;
    let Some(database) = dbs.get(&db) else {
        return db_missing();
    };
    let deleted = database.docs.values().filter(|doc| doc.deleted).count();
    reply(
        StatusCode::OK,
        json!({
            "db_name": db,
            "doc_count": database.docs.len() - deleted,
            "doc_del_count": deleted,
        }),
    )
}

async fn create_db(State(state): State<AppState>, Path(db): Path<String>, headers: HeaderMap) -> Reply {
    if !is_admin(&headers, &state.options) {
        return unauthorized();
    }
    if !valid_db_name(&db) {
        return error(StatusCode::BAD_REQUEST, "illegal_database_name", "Name is not a valid database name.");
    }
    let mut dbs = state.dbs.write().await;
    if dbs.contains_key(&db) {
        return error(
            StatusCode::PRECONDITION_FAILED,
            "file_exists",
            "The database could not be created, the file already exists.",
        );
    }
    dbs.insert(db.clone(), Database::default());
    info!(db = %db, "database created");

    if state.options.quirk_500_on_create {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "unknown_error", "function_clause");
    }
    reply(StatusCode::CREATED, json!({ "ok": true }))
}

async fn delete_db(State(state): State<AppState>, Path(db): Path<String>, headers: HeaderMap) -> Reply {
    if !is_admin(&headers, &state.options) {
        return unauthorized();
    }
    let mut dbs = state.dbs.write().await;
    if dbs.remove(&db).is_none() {
        return db_missing();
    }
    info!(db = %db, "database deleted");
    reply(StatusCode::OK, json!({ "ok": true }))
}

// --- documents ---

async fn get_doc(State(state): State<AppState>, Path((db, id)): Path<(String, String)>) -> Reply {
    let dbs = state.dbs.read().await;
    let Some(database) = dbs.get(&db) else {
        return db_missing();
    };
    match database.docs.get(&id) {
        None => error(StatusCode::NOT_FOUND, "not_found", "missing"),
        Some(doc) if doc.deleted => error(StatusCode::NOT_FOUND, "not_found", "deleted"),
        Some(doc) => {
            let mut body = Map::new();
            body.insert("_id".to_string(), json!(id));
            body.insert("_rev".to_string(), json!(doc.rev));
            body.extend(doc.fields.clone());
            reply(StatusCode::OK, Value::Object(body))
        }
    }
}

async fn put_doc(
    State(state): State<AppState>,
    Path((db, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    let Value::Object(mut fields) = body else {
        return error(StatusCode::BAD_REQUEST, "bad_request", "Document must be a JSON object");
    };
    let supplied_rev = fields.remove("_rev");
    fields.remove("_id");

    let mut dbs = state.dbs.write().await;
    let Some(database) = dbs.get_mut(&db) else {
        return db_missing();
    };

    let generation = match database.docs.get(&id) {
        Some(doc) if !doc.deleted => {
            if supplied_rev.as_ref().and_then(Value::as_str) != Some(doc.rev.as_str()) {
                return conflict();
            }
            doc.generation + 1
        }
        Some(tombstone) => tombstone.generation + 1,
        None => 1,
    };

    let rev = new_rev(generation);
    database.docs.insert(
        id.clone(),
        StoredDoc {
            generation,
            rev: rev.clone(),
            fields,
            deleted: false,
        },
    );
    reply(StatusCode::CREATED, json!({ "ok": true, "id": id, "rev": rev }))
}

async fn delete_doc(
    State(state): State<AppState>,
    Path((db, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    let mut dbs = state.dbs.write().await;
    let Some(database) = dbs.get_mut(&db) else {
        return db_missing();
    };
    let Some(doc) = database.docs.get_mut(&id).filter(|doc| !doc.deleted) else {
        return error(StatusCode::NOT_FOUND, "not_found", "missing");
    };
    if params.get("rev") != Some(&doc.rev) {
        return conflict();
    }

    // Keep a tombstone so a later PUT continues the revision history.
    doc.generation += 1;
    doc.rev = new_rev(doc.generation);
    doc.fields.clear();
    doc.deleted = true;
    reply(StatusCode::OK, json!({ "ok": true, "id": id, "rev": doc.rev }))
}
