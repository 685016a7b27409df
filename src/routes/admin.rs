//! Admin read-only overview: platform stats, users, activity, content.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::Serialize;

use crate::db::models::Role;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Serialize)]
pub struct PlatformStats {
    pub total_users: i64,
    pub total_videos: i64,
    pub total_sessions: i64,
    pub active_today: i64,
}

#[derive(Serialize)]
pub struct AdminUserView {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub coins: i64,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct AdminActivityView {
    pub id: String,
    pub user_id: String,
    pub full_name: String,
    pub login_at: String,
    pub logout_at: Option<String>,
    pub time_spent_minutes: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/users", get(users))
        .route("/admin/sessions", get(sessions))
        .route("/admin/videos", get(videos))
}

async fn stats(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<PlatformStats>> {
    user.require_role(Role::Admin)?;
    let conn = state.db.get()?;
    Ok(Json(query_stats(&conn)?))
}

async fn users(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<AdminUserView>>> {
    user.require_role(Role::Admin)?;
    let conn = state.db.get()?;

    let mut stmt = conn.prepare(
        "SELECT p.id, p.full_name, p.email, r.role, p.coins, p.created_at
         FROM profiles p
         JOIN user_roles r ON r.user_id = p.id
         ORDER BY p.created_at DESC",
    )?;
    let users = stmt
        .query_map([], |row| {
            Ok(AdminUserView {
                id: row.get(0)?,
                full_name: row.get(1)?,
                email: row.get(2)?,
                role: row.get(3)?,
                coins: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect::<Vec<_>>();

    Ok(Json(users))
}

async fn sessions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<AdminActivityView>>> {
    user.require_role(Role::Admin)?;
    let conn = state.db.get()?;

    let mut stmt = conn.prepare(
        "SELECT s.id, s.user_id, p.full_name, s.login_at, s.logout_at, s.time_spent_minutes
         FROM user_sessions s
         JOIN profiles p ON p.id = s.user_id
         ORDER BY s.login_at DESC
         LIMIT 500",
    )?;
    let sessions = stmt
        .query_map([], |row| {
            Ok(AdminActivityView {
                id: row.get(0)?,
                user_id: row.get(1)?,
                full_name: row.get(2)?,
                login_at: row.get(3)?,
                logout_at: row.get(4)?,
                time_spent_minutes: row.get(5)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect::<Vec<_>>();

    Ok(Json(sessions))
}

async fn videos(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<super::videos::VideoView>>> {
    user.require_role(Role::Admin)?;
    let conn = state.db.get()?;
    Ok(Json(super::videos::query_videos(&conn, None, None)?))
}

pub fn query_stats(conn: &rusqlite::Connection) -> Result<PlatformStats, AppError> {
    let total_users: i64 = conn.query_row("SELECT COUNT(*) FROM profiles", [], |r| r.get(0))?;
    let total_videos: i64 = conn.query_row("SELECT COUNT(*) FROM videos", [], |r| r.get(0))?;
    let total_sessions: i64 =
        conn.query_row("SELECT COUNT(*) FROM user_sessions", [], |r| r.get(0))?;
    let active_today: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT user_id) FROM user_sessions WHERE login_at >= date('now')",
        params![],
        |r| r.get(0),
    )?;

    Ok(PlatformStats {
        total_users,
        total_videos,
        total_sessions,
        active_today,
    })
}
