//! Per-visit activity tracking.
//!
//! The client opens a tracking row when a portal loads, and closes it on
//! sign-out or through the unload beacon. Beacons are fired from a dying
//! tab, so the endpoint swallows errors and always answers 204.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activity/start", post(start))
        .route("/activity/{id}/end", post(end))
        .route("/activity/{id}/beacon", post(beacon))
}

/// POST /activity/start — open a tracking row, return its id for the
/// matching end/beacon call.
async fn start(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let id = start_tracking(&conn, &user.id)?;
    Ok(Json(serde_json::json!({ "id": id })))
}

/// POST /activity/{id}/end — close the row, computing the minutes spent.
async fn end(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let closed = end_tracking(&conn, &id, &user.id)?;
    if !closed {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// POST /activity/{id}/beacon — same close, but lossy by contract: the
/// sender is gone, so nothing is ever reported back as a failure, not
/// even an expired session.
async fn beacon(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> StatusCode {
    let Some(user) = user else {
        tracing::debug!(tracking = %id, "beacon without a live session");
        return StatusCode::NO_CONTENT;
    };

    let result = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| end_tracking(&conn, &id, &user.id));
    if let Err(err) = result {
        tracing::debug!(%err, tracking = %id, "beacon close failed");
    }
    StatusCode::NO_CONTENT
}

pub fn start_tracking(conn: &rusqlite::Connection, user_id: &str) -> Result<String, AppError> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO user_sessions (id, user_id) VALUES (?1, ?2)",
        params![id, user_id],
    )?;
    Ok(id)
}

/// Close an open tracking row. Returns false when no open row matched;
/// closing twice leaves the first result alone.
pub fn end_tracking(
    conn: &rusqlite::Connection,
    tracking_id: &str,
    user_id: &str,
) -> Result<bool, AppError> {
    let changed = conn.execute(
        "UPDATE user_sessions SET \
             logout_at = datetime('now'), \
             time_spent_minutes = CAST(ROUND((julianday('now') - julianday(login_at)) * 1440) AS INTEGER) \
         WHERE id = ?1 AND user_id = ?2 AND logout_at IS NULL",
        params![tracking_id, user_id],
    )?;
    Ok(changed > 0)
}
