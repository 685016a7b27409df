//! Local object storage for uploaded files (avatars, video files).
//!
//! Objects are stored under `{uploads_dir}/{owner_id}/{uuid}.{ext}` and
//! served back under the public `/uploads/{owner_id}/{name}` path with a
//! guessed content type.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Store an uploaded object and return its public URL path.
pub fn save_upload(
    root: &std::path::Path,
    owner_id: &str,
    original_name: &str,
    data: &[u8],
) -> Result<String, AppError> {
    let ext = sanitize_extension(original_name);
    let name = match ext {
        Some(ext) => format!("{}.{}", uuid::Uuid::now_v7(), ext),
        None => uuid::Uuid::now_v7().to_string(),
    };

    let dir = root.join(owner_id);
    std::fs::create_dir_all(&dir)
        .map_err(|e| AppError::Internal(format!("Failed to create upload dir: {}", e)))?;
    std::fs::write(dir.join(&name), data)
        .map_err(|e| AppError::Internal(format!("Failed to write upload: {}", e)))?;

    Ok(format!("/uploads/{}/{}", owner_id, name))
}

/// Lowercased alphanumeric extension from the client-supplied file name.
fn sanitize_extension(original_name: &str) -> Option<String> {
    let ext = original_name.rsplit('.').next()?;
    if ext.is_empty() || ext.len() > 8 || ext == original_name {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// A single path component as produced by `save_upload`; anything that
/// could climb out of the uploads dir is rejected.
fn is_safe_component(s: &str) -> bool {
    !s.is_empty() && !s.contains(['/', '\\']) && s != "." && s != ".."
}

/// GET /uploads/{owner}/{name} — serve a stored object.
async fn serve(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
) -> AppResult<Response> {
    if !is_safe_component(&owner) || !is_safe_component(&name) {
        return Err(AppError::BadRequest("Invalid object path".into()));
    }

    let path = state.config.uploads_path().join(&owner).join(&name);
    let data = tokio::fs::read(&path).await.map_err(|_| AppError::NotFound)?;

    let mime = mime_guess::from_path(&name).first_or_octet_stream();

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.to_string())],
        data,
    )
        .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/uploads/{owner}/{name}", get(serve))
}
