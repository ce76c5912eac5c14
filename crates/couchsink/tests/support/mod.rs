//! A fake `CouchDB` server for integration tests.
//!
//! Implements just enough of the document API for the sink: database
//! create/check, document create/update with revision checks, and fetch by
//! revision. Requests must carry basic auth for [`USERNAME`]/[`PASSWORD`].

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::significant_drop_tightening
)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::put;
use axum::{Json, Router};
use serde_json::{Value, json};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";

/// `Basic base64("admin:secret")`.
const EXPECTED_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

#[derive(Default)]
struct Inner {
    /// db -> id -> revisions, oldest first.
    dbs: BTreeMap<String, BTreeMap<String, Vec<(String, Value)>>>,
    seq: u64,
    /// Database-level requests (create or check), i.e. connects.
    connects: usize,
    error_field: Option<String>,
    fail_fetch: bool,
}

/// Shared handle to the fake server's state.
#[derive(Clone, Default)]
pub struct FakeCouch {
    inner: Arc<Mutex<Inner>>,
}

impl FakeCouch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a database.
    pub fn with_database(self, db: &str) -> Self {
        self.inner.lock().unwrap().dbs.entry(db.to_owned()).or_default();
        self
    }

    /// Accept writes but report this error field in the response body.
    pub fn respond_with_error_field(&self, error: &str) {
        self.inner.lock().unwrap().error_field = Some(error.to_owned());
    }

    /// Fail every document fetch with a 500.
    pub fn fail_fetches(&self) {
        self.inner.lock().unwrap().fail_fetch = true;
    }

    pub fn has_database(&self, db: &str) -> bool {
        self.inner.lock().unwrap().dbs.contains_key(db)
    }

    pub fn connects(&self) -> usize {
        self.inner.lock().unwrap().connects
    }

    pub fn document_count(&self, db: &str) -> usize {
        self.inner.lock().unwrap().dbs.get(db).map_or(0, BTreeMap::len)
    }

    pub fn latest(&self, db: &str, id: &str) -> Option<(String, Value)> {
        self.inner
            .lock()
            .unwrap()
            .dbs
            .get(db)
            .and_then(|docs| docs.get(id))
            .and_then(|revs| revs.last())
            .cloned()
    }

    /// Start serving on an ephemeral port.
    pub async fn start(&self) -> SocketAddr {
        let app = Router::new()
            .route("/{db}", put(create_db).get(db_info).post(post_doc))
            .route("/{db}/{id}", put(put_doc).get(get_doc))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(EXPECTED_AUTH)
}

fn error(status: StatusCode, error: &str, reason: &str) -> Response {
    (status, Json(json!({ "error": error, "reason": reason }))).into_response()
}

fn unauthorized() -> Response {
    error(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "Name or password is incorrect.",
    )
}

async fn create_db(
    State(fake): State<FakeCouch>,
    headers: HeaderMap,
    Path(db): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut inner = fake.inner.lock().unwrap();
    inner.connects += 1;
    if inner.dbs.contains_key(&db) {
        return error(
            StatusCode::PRECONDITION_FAILED,
            "file_exists",
            "The database could not be created, the file already exists.",
        );
    }
    inner.dbs.insert(db, BTreeMap::new());
    (StatusCode::CREATED, Json(json!({ "ok": true }))).into_response()
}

async fn db_info(
    State(fake): State<FakeCouch>,
    headers: HeaderMap,
    Path(db): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut inner = fake.inner.lock().unwrap();
    inner.connects += 1;
    match inner.dbs.get(&db) {
        Some(docs) => Json(json!({ "db_name": db, "doc_count": docs.len() })).into_response(),
        None => error(StatusCode::NOT_FOUND, "not_found", "Database does not exist."),
    }
}

async fn post_doc(
    State(fake): State<FakeCouch>,
    headers: HeaderMap,
    Path(db): Path<String>,
    body: Bytes,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let id = {
        let mut inner = fake.inner.lock().unwrap();
        inner.seq += 1;
        format!("{:032x}", inner.seq)
    };
    store_doc(&fake, &db, &id, &body)
}

async fn put_doc(
    State(fake): State<FakeCouch>,
    headers: HeaderMap,
    Path((db, id)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    store_doc(&fake, &db, &id, &body)
}

fn store_doc(fake: &FakeCouch, db: &str, id: &str, body: &[u8]) -> Response {
    let Ok(Value::Object(mut doc)) = serde_json::from_slice::<Value>(body) else {
        return error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "Document must be a JSON object",
        );
    };

    let mut inner = fake.inner.lock().unwrap();
    inner.seq += 1;
    let seq = inner.seq;
    let error_field = inner.error_field.clone();

    let Some(docs) = inner.dbs.get_mut(db) else {
        return error(StatusCode::NOT_FOUND, "not_found", "Database does not exist.");
    };

    let submitted = doc.get("_rev").and_then(Value::as_str).map(str::to_owned);
    let current = docs.get(id).and_then(|revs| revs.last()).map(|(rev, _)| rev.clone());
    if submitted != current {
        return error(StatusCode::CONFLICT, "conflict", "Document update conflict.");
    }

    let generation = docs.get(id).map_or(0, Vec::len) + 1;
    let rev = format!("{generation}-{seq:032x}");
    doc.insert("_id".to_owned(), Value::String(id.to_owned()));
    doc.insert("_rev".to_owned(), Value::String(rev.clone()));
    docs.entry(id.to_owned())
        .or_default()
        .push((rev.clone(), Value::Object(doc)));

    let mut response = json!({ "ok": true, "id": id, "rev": rev });
    if let Some(error_field) = error_field {
        response["error"] = Value::String(error_field);
        response["reason"] = Value::String("scripted partial failure".to_owned());
    }
    (StatusCode::CREATED, Json(response)).into_response()
}

async fn get_doc(
    State(fake): State<FakeCouch>,
    headers: HeaderMap,
    Path((db, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let inner = fake.inner.lock().unwrap();
    if inner.fail_fetch {
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_server_error",
            "scripted fetch failure",
        );
    }
    let found = inner
        .dbs
        .get(&db)
        .and_then(|docs| docs.get(&id))
        .and_then(|revs| match params.get("rev") {
            Some(rev) => revs.iter().find(|(r, _)| r == rev),
            None => revs.last(),
        });
    match found {
        Some((_, doc)) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "application/json")],
            serde_json::to_vec(doc).unwrap(),
        )
            .into_response(),
        None => error(StatusCode::NOT_FOUND, "not_found", "missing"),
    }
}
