// [[GATEKEEPER]]/apps/gatekeeper/src/server/handlers.rs
// Purpose: API Handlers. Each loads its resource projection, then asks the ownership resolver.
// Architecture: API Layer
// Dependencies: Axum, Directory, Ownership

use axum::extract::{Json, Path, State};
use serde_json::json;

use crate::error::GateError;
use crate::models::{Principal, SelfScoped};
use crate::observability::GateStatsSnapshot;
use crate::ownership::ensure_access;
use crate::security::AuthedPrincipal;
use crate::server::AppState;

#[derive(serde::Serialize)]
pub struct HealthResponse {
    status: String,
    message: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Gatekeeper is running".to_string(),
    })
}

pub async fn me(AuthedPrincipal(principal): AuthedPrincipal) -> Json<Principal> {
    Json(principal)
}

pub async fn get_settings(
    State(state): State<AppState>,
    AuthedPrincipal(principal): AuthedPrincipal,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, GateError> {
    let scope = SelfScoped { subject_id: user_id };
    ensure_access(&principal, Some(&scope), "User")?;

    Ok(Json(json!({
        "user_id": scope.subject_id,
        "settings": state.directory.settings(&scope.subject_id)
    })))
}

pub async fn update_settings(
    State(state): State<AppState>,
    AuthedPrincipal(principal): AuthedPrincipal,
    Path(user_id): Path<String>,
    Json(settings): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, GateError> {
    let scope = SelfScoped { subject_id: user_id };
    ensure_access(&principal, Some(&scope), "User")?;

    tracing::info!("User {} updated settings of {}", principal.user_id, scope.subject_id);
    state.directory.set_settings(&scope.subject_id, settings.clone());

    Ok(Json(json!({
        "success": true,
        "user_id": scope.subject_id,
        "settings": settings
    })))
}

pub async fn get_project(
    State(state): State<AppState>,
    AuthedPrincipal(principal): AuthedPrincipal,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, GateError> {
    let project = state.directory.project(&id);
    ensure_access(&principal, project.as_ref(), "Project")?;

    Ok(Json(json!({ "id": id, "project": project })))
}

pub async fn get_task(
    State(state): State<AppState>,
    AuthedPrincipal(principal): AuthedPrincipal,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, GateError> {
    let task = state.directory.task(&id);
    ensure_access(&principal, task.as_ref(), "Task")?;

    Ok(Json(json!({ "id": id, "task": task })))
}

pub async fn get_file(
    State(state): State<AppState>,
    AuthedPrincipal(principal): AuthedPrincipal,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, GateError> {
    let file = state.directory.file(&id);
    ensure_access(&principal, file.as_ref(), "File")?;

    Ok(Json(json!({ "id": id, "file": file })))
}

pub async fn admin_stats(State(state): State<AppState>) -> Json<GateStatsSnapshot> {
    Json(state.gate.stats().snapshot(state.gate.limiter()))
}
