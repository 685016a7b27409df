use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::models::Role;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Serialize)]
pub struct LiveSessionView {
    pub id: String,
    pub senior_id: String,
    pub senior_name: String,
    pub title: String,
    pub description: Option<String>,
    pub live_url: String,
    pub is_active: bool,
    pub started_at: String,
    pub ended_at: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateLiveRequest {
    pub title: String,
    pub description: Option<String>,
    pub live_url: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/live", get(list_active).post(start_session))
        .route("/live/mine", get(my_sessions))
        .route("/live/{id}/stop", post(stop_session))
}

/// GET /live — currently active sessions, for every signed-in role.
async fn list_active(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<LiveSessionView>>> {
    let conn = state.db.get()?;
    Ok(Json(query_sessions(&conn, true, None)?))
}

/// GET /live/mine — the senior's own sessions, active and past.
async fn my_sessions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<LiveSessionView>>> {
    user.require_role(Role::Senior)?;
    let conn = state.db.get()?;
    Ok(Json(query_sessions(&conn, false, Some(&user.id))?))
}

/// POST /live — a senior goes live.
async fn start_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateLiveRequest>,
) -> AppResult<Response> {
    user.require_role(Role::Senior)?;

    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Please provide a session title".into()));
    }
    if url::Url::parse(req.live_url.trim()).is_err() {
        return Err(AppError::BadRequest("Live URL is not a valid URL".into()));
    }

    let session_id = uuid::Uuid::now_v7().to_string();
    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO live_sessions (id, senior_id, title, description, live_url) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![session_id, user.id, title, req.description, req.live_url.trim()],
    )?;

    tracing::info!(session = %session_id, senior = %user.id, "live session started");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": session_id })),
    )
        .into_response())
}

/// POST /live/{id}/stop — end a session. Ending is terminal; a stopped
/// session never goes active again.
async fn stop_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    user.require_role(Role::Senior)?;

    let conn = state.db.get()?;
    end_session(&conn, &id, &user.id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Flip an active session to ended. The `is_active = 1` guard in the WHERE
/// clause is what makes the transition one-way.
pub fn end_session(
    conn: &rusqlite::Connection,
    session_id: &str,
    senior_id: &str,
) -> Result<(), AppError> {
    let changed = conn.execute(
        "UPDATE live_sessions SET is_active = 0, ended_at = datetime('now') \
         WHERE id = ?1 AND senior_id = ?2 AND is_active = 1",
        params![session_id, senior_id],
    )?;

    if changed == 0 {
        // Distinguish a missing/foreign session from one already over.
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM live_sessions WHERE id = ?1 AND senior_id = ?2",
            params![session_id, senior_id],
            |r| r.get(0),
        )?;
        if exists {
            return Err(AppError::BadRequest("Session has already ended".into()));
        }
        return Err(AppError::NotFound);
    }

    Ok(())
}

pub fn query_sessions(
    conn: &rusqlite::Connection,
    active_only: bool,
    owner_filter: Option<&str>,
) -> Result<Vec<LiveSessionView>, AppError> {
    let owner = owner_filter.unwrap_or("");
    let mut stmt = conn.prepare(
        "SELECT s.id, s.senior_id, p.full_name, s.title, s.description, s.live_url,
                s.is_active, s.started_at, s.ended_at
         FROM live_sessions s
         JOIN profiles p ON p.id = s.senior_id
         WHERE (?1 = 0 OR s.is_active = 1)
           AND (?2 = '' OR s.senior_id = ?2)
         ORDER BY s.started_at DESC",
    )?;

    let sessions = stmt
        .query_map(params![active_only as i64, owner], |row| {
            Ok(LiveSessionView {
                id: row.get(0)?,
                senior_id: row.get(1)?,
                senior_name: row.get(2)?,
                title: row.get(3)?,
                description: row.get(4)?,
                live_url: row.get(5)?,
                is_active: row.get(6)?,
                started_at: row.get(7)?,
                ended_at: row.get(8)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(sessions)
}
