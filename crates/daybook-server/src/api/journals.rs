// ABOUTME: Journal CRUD and reconciliation API handlers.
// ABOUTME: Parses request bodies into validated inputs and delegates to the shared JournalStore.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use daybook_core::{EntryPatch, NewEntry};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::SharedState;
use crate::error::ApiError;

/// Request body for creating or updating an entry. Every field is optional
/// at the wire level; create validates presence, update treats absence as
/// "keep".
#[derive(Debug, Default, Deserialize)]
pub struct EntryBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// GET /api/journals/{owner} - List an owner's entry summaries, newest first.
pub async fn list_entries(
    State(state): State<SharedState>,
    Path(owner): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.store.list(&owner).await.map_err(|e| {
        ApiError::from_journal(e, "Failed to retrieve journal entries", state.expose_errors)
    })?;
    Ok(Json(json!({ "owner": owner, "entries": entries })))
}

/// GET /api/journals/{owner}/{id} - Fetch one full entry.
pub async fn get_entry(
    State(state): State<SharedState>,
    Path((owner, entry_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.store.get(&owner, &entry_id).await.map_err(|e| {
        ApiError::from_journal(e, "Failed to retrieve journal entry", state.expose_errors)
    })?;
    Ok(Json(entry))
}

/// POST /api/journals/{owner} - Create an entry.
pub async fn create_entry(
    State(state): State<SharedState>,
    Path(owner): Path<String>,
    body: Result<Json<EntryBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.map_err(ApiError::from_rejection)?;
    let failure = "Failed to create journal entry";

    let new = NewEntry::new(body.title, body.content, body.mood, body.tags).map_err(|e| {
        tracing::warn!(owner = %owner, error = %e, "invalid journal entry");
        ApiError::from_journal(e, failure, state.expose_errors)
    })?;
    let entry = state
        .store
        .create(&owner, new)
        .await
        .map_err(|e| ApiError::from_journal(e, failure, state.expose_errors))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Journal entry created", "entry": entry })),
    ))
}

/// PUT /api/journals/{owner}/{id} - Merge fields onto an existing entry.
pub async fn update_entry(
    State(state): State<SharedState>,
    Path((owner, entry_id)): Path<(String, String)>,
    body: Result<Json<EntryBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.map_err(ApiError::from_rejection)?;
    let failure = "Failed to update journal entry";

    let patch = EntryPatch::new(body.title, body.content, body.mood, body.tags)
        .map_err(|e| ApiError::from_journal(e, failure, state.expose_errors))?;
    let entry = state
        .store
        .update(&owner, &entry_id, patch)
        .await
        .map_err(|e| ApiError::from_journal(e, failure, state.expose_errors))?;

    Ok(Json(json!({ "message": "Journal entry updated", "entry": entry })))
}

/// DELETE /api/journals/{owner}/{id} - Remove an entry. Succeeds for absent entries.
pub async fn delete_entry(
    State(state): State<SharedState>,
    Path((owner, entry_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete(&owner, &entry_id).await.map_err(|e| {
        ApiError::from_journal(e, "Failed to delete journal entry", state.expose_errors)
    })?;
    Ok(Json(json!({ "message": "Journal entry deleted" })))
}

/// POST /api/journals/{owner}/reconcile - Rebuild an owner's index from their entries.
pub async fn reconcile_owner(
    State(state): State<SharedState>,
    Path(owner): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.store.rebuild_index(&owner).await.map_err(|e| {
        ApiError::from_journal(e, "Failed to reconcile journal index", state.expose_errors)
    })?;
    Ok(Json(report))
}
