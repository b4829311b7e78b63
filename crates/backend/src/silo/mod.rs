//! The document endpoints the frontend reads and writes its markers through.

use std::sync::Arc;

use atlas_shared::maps::DEFAULT_MAP_ID;
use atlas_shared::models::MapStore;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::storage::Storage;

pub const WRITE_KEY_HEADER: &str = "x-man-api";

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    /// Writes are refused outright when unset.
    pub write_key: Option<Arc<str>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub documents: u64,
    pub db_size_bytes: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/silo/public/{silo}", get(get_document))
        .route("/api/silo/api/v1/manage/{silo}", patch(put_document))
        .route("/api/health", get(health))
}

fn silo_key(silo: &str) -> Result<String, StatusCode> {
    Uuid::parse_str(silo)
        .map(|id| id.to_string())
        .map_err(|_| StatusCode::NOT_FOUND)
}

fn internal(silo: &str, e: String) -> StatusCode {
    tracing::error!(silo, error = %e, "storage failure");
    StatusCode::INTERNAL_SERVER_ERROR
}

fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(expected) = state.write_key.as_deref() else {
        return false;
    };
    headers
        .get(WRITE_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|given| given == expected)
}

async fn get_document(
    State(state): State<AppState>,
    Path(silo): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let key = silo_key(&silo)?;
    let doc = state
        .storage
        .get_document(&key)
        .map_err(|e| internal(&key, e))?;
    Ok(Json(doc.map(|d| d.file_data).unwrap_or_else(|| json!([]))))
}

async fn put_document(
    State(state): State<AppState>,
    Path(silo): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    let key = silo_key(&silo)?;
    if !authorized(&state, &headers) {
        tracing::warn!(silo = %key, "rejected write without a valid key");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let mut request: Value =
        serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;
    let file_data = match request.get_mut("file_data").map(Value::take) {
        Some(data @ Value::Array(_)) => data,
        _ => return Err(StatusCode::BAD_REQUEST),
    };

    match MapStore::from_value(file_data.clone(), DEFAULT_MAP_ID) {
        Ok(store) => tracing::info!(
            silo = %key,
            maps = store.entries().len(),
            markers = store.entries().iter().map(|e| e.markers.len()).sum::<usize>(),
            "document saved"
        ),
        Err(e) => tracing::warn!(silo = %key, error = %e, "saved a document that does not decode"),
    }

    state
        .storage
        .save_document(&key, file_data)
        .map_err(|e| internal(&key, e))?;
    Ok(Json(json!({ "ok": true })))
}

async fn health(State(state): State<AppState>) -> Result<Json<Health>, StatusCode> {
    let documents = state
        .storage
        .count_documents()
        .map_err(|e| internal("-", e))?;
    let db_size_bytes = state
        .storage
        .db_size_bytes()
        .map_err(|e| internal("-", e))?;
    Ok(Json(Health {
        documents,
        db_size_bytes,
    }))
}
