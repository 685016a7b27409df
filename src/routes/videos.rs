use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::models::Role;
use crate::error::{AppError, AppResult};
use crate::events::{ChangeEvent, ChangeOp, ChangeTable};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::storage;

const MAX_VIDEO_BYTES: usize = 100 * 1024 * 1024;

/// Coins credited to the owning senior per watched minute.
const COINS_PER_WATCH_MINUTE: i64 = 1;

// --- View structs ---

#[derive(Serialize)]
pub struct VideoView {
    pub id: String,
    pub senior_id: String,
    pub senior_name: String,
    pub title: String,
    pub description: Option<String>,
    pub video_url: String,
    pub like_count: i64,
    pub watch_time_minutes: i64,
    pub liked: bool,
    pub created_at: String,
}

// --- Forms ---

#[derive(Deserialize)]
pub struct CreateVideoRequest {
    pub title: String,
    pub description: Option<String>,
    pub video_url: String,
}

#[derive(Deserialize)]
pub struct WatchRequest {
    pub minutes: i64,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/videos", get(list_videos).post(create_video))
        .route(
            "/videos/upload",
            post(upload_video).layer(DefaultBodyLimit::max(MAX_VIDEO_BYTES + 4096)),
        )
        .route("/videos/mine", get(my_videos))
        .route("/videos/{id}", delete(delete_video))
        .route("/videos/{id}/like", post(like_video))
        .route("/videos/{id}/watch", post(watch_video))
}

// --- Handlers ---

/// GET /videos — every video with its owner's name; `liked` reflects the
/// caller's own like row.
async fn list_videos(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<VideoView>>> {
    let conn = state.db.get()?;
    Ok(Json(query_videos(&conn, Some(&user.id), None)?))
}

/// GET /videos/mine — the senior's own uploads.
async fn my_videos(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<VideoView>>> {
    user.require_role(Role::Senior)?;
    let conn = state.db.get()?;
    Ok(Json(query_videos(&conn, Some(&user.id), Some(&user.id))?))
}

/// POST /videos — register a video by external URL.
async fn create_video(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateVideoRequest>,
) -> AppResult<Response> {
    user.require_role(Role::Senior)?;

    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Please provide title and video URL".into()));
    }
    if url::Url::parse(req.video_url.trim()).is_err() {
        return Err(AppError::BadRequest("Video URL is not a valid URL".into()));
    }

    let video_id = insert_video(
        &state,
        &user.id,
        &title,
        req.description.as_deref(),
        req.video_url.trim(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": video_id })),
    )
        .into_response())
}

/// POST /videos/upload — multipart variant storing the file itself.
async fn upload_video(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Response> {
    user.require_role(Role::Senior)?;

    let mut title = String::new();
    let mut description: Option<String> = None;
    let mut stored_url: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        match field.name() {
            Some("title") => {
                title = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
                    .trim()
                    .to_string();
            }
            Some("description") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;
                if !text.trim().is_empty() {
                    description = Some(text.trim().to_string());
                }
            }
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::BadRequest("Missing file name".into()))?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;
                if data.is_empty() {
                    return Err(AppError::BadRequest("Uploaded file is empty".into()));
                }
                stored_url = Some(storage::save_upload(
                    state.config.uploads_path(),
                    &user.id,
                    &file_name,
                    &data,
                )?);
            }
            _ => {}
        }
    }

    if title.is_empty() {
        return Err(AppError::BadRequest("Please provide title and video file".into()));
    }
    let video_url =
        stored_url.ok_or_else(|| AppError::BadRequest("No video file in upload".into()))?;

    let video_id = insert_video(&state, &user.id, &title, description.as_deref(), &video_url)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": video_id, "video_url": video_url })),
    )
        .into_response())
}

/// DELETE /videos/{id} — owner or admin only.
async fn delete_video(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;

    let owner_id: String = conn
        .query_row(
            "SELECT senior_id FROM videos WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;

    if owner_id != user.id && user.role != Role::Admin {
        return Err(AppError::Forbidden);
    }

    conn.execute("DELETE FROM videos WHERE id = ?1", params![id])?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// POST /videos/{id}/like — students toggle their like on a video.
async fn like_video(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    user.require_role(Role::Student)?;

    let conn = state.db.get()?;
    let liked = toggle_like(&conn, &id, &user.id)?;
    let like_count = like_count(&conn, &id)?;

    Ok(Json(serde_json::json!({
        "liked": liked,
        "like_count": like_count,
    })))
}

/// POST /videos/{id}/watch — report watched minutes; the owning senior is
/// credited coins for them.
async fn watch_video(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<WatchRequest>,
) -> AppResult<Json<serde_json::Value>> {
    user.require_role(Role::Student)?;

    if !(1..=600).contains(&req.minutes) {
        return Err(AppError::BadRequest(
            "Watched minutes must be between 1 and 600".into(),
        ));
    }

    let owner_id = {
        let conn = state.db.get()?;
        record_watch(&conn, &id, req.minutes)?
    };

    // Coin balances ride the profiles change feed, so the senior's badge
    // updates without a manual refresh.
    state.events.publish(ChangeEvent {
        table: ChangeTable::Profiles,
        op: ChangeOp::Update,
        row_id: owner_id.clone(),
        owner_id,
        audience_id: None,
    });

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

// --- Write helpers ---

fn insert_video(
    state: &AppState,
    senior_id: &str,
    title: &str,
    description: Option<&str>,
    video_url: &str,
) -> Result<String, AppError> {
    let video_id = uuid::Uuid::now_v7().to_string();
    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO videos (id, senior_id, title, description, video_url) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![video_id, senior_id, title, description, video_url],
    )?;
    Ok(video_id)
}

/// Toggle the (video, student) like row: delete when present, insert when
/// absent. Returns the new liked state. The unique index on
/// (video_id, student_id) keeps racing toggles from ever producing a
/// second row.
pub fn toggle_like(
    conn: &rusqlite::Connection,
    video_id: &str,
    student_id: &str,
) -> Result<bool, AppError> {
    // Verify video exists
    let _: String = conn
        .query_row(
            "SELECT id FROM videos WHERE id = ?1",
            params![video_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM video_likes WHERE video_id = ?1 AND student_id = ?2",
            params![video_id, student_id],
            |r| r.get(0),
        )
        .ok();

    if existing.is_some() {
        conn.execute(
            "DELETE FROM video_likes WHERE video_id = ?1 AND student_id = ?2",
            params![video_id, student_id],
        )?;
        Ok(false)
    } else {
        let like_id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO video_likes (id, video_id, student_id) VALUES (?1, ?2, ?3)",
            params![like_id, video_id, student_id],
        )?;
        Ok(true)
    }
}

/// The like counter is derived, never stored.
pub fn like_count(conn: &rusqlite::Connection, video_id: &str) -> Result<i64, AppError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM video_likes WHERE video_id = ?1",
        params![video_id],
        |r| r.get(0),
    )?)
}

/// Accrue watch time on the video and coins on its owner. Returns the
/// owner's id.
pub fn record_watch(
    conn: &rusqlite::Connection,
    video_id: &str,
    minutes: i64,
) -> Result<String, AppError> {
    let owner_id: String = conn
        .query_row(
            "SELECT senior_id FROM videos WHERE id = ?1",
            params![video_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;

    conn.execute(
        "UPDATE videos SET watch_time_minutes = watch_time_minutes + ?1 WHERE id = ?2",
        params![minutes, video_id],
    )?;
    conn.execute(
        "UPDATE profiles SET coins = coins + ?1 WHERE id = ?2",
        params![minutes * COINS_PER_WATCH_MINUTE, owner_id],
    )?;

    Ok(owner_id)
}

// --- Query helpers ---

pub fn query_videos(
    conn: &rusqlite::Connection,
    viewer_id: Option<&str>,
    owner_filter: Option<&str>,
) -> Result<Vec<VideoView>, AppError> {
    let viewer = viewer_id.unwrap_or("");
    let owner = owner_filter.unwrap_or("");

    let mut stmt = conn.prepare(
        "SELECT v.id, v.senior_id, p.full_name, v.title, v.description, v.video_url,
                COALESCE((SELECT COUNT(*) FROM video_likes l WHERE l.video_id = v.id), 0) as like_count,
                v.watch_time_minutes,
                COALESCE((SELECT COUNT(*) > 0 FROM video_likes l WHERE l.video_id = v.id AND l.student_id = ?1), 0) as liked,
                v.created_at
         FROM videos v
         JOIN profiles p ON p.id = v.senior_id
         WHERE (?2 = '' OR v.senior_id = ?2)
         ORDER BY v.created_at DESC",
    )?;

    let videos = stmt
        .query_map(params![viewer, owner], |row| {
            Ok(VideoView {
                id: row.get(0)?,
                senior_id: row.get(1)?,
                senior_name: row.get(2)?,
                title: row.get(3)?,
                description: row.get(4)?,
                video_url: row.get(5)?,
                like_count: row.get(6)?,
                watch_time_minutes: row.get(7)?,
                liked: row.get(8)?,
                created_at: row.get(9)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(videos)
}

// --- Tests ---
