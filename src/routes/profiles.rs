use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;

use crate::auth::handlers::validate_interests;
use crate::db::models::{Profile, Role};
use crate::error::{AppError, AppResult};
use crate::events::{ChangeEvent, ChangeOp, ChangeTable};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::storage;

const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: String,
    pub age: i64,
    pub mobile_number: String,
    pub email: String,
    pub description: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub theme_preference: Option<String>,
}

/// Load a profile row. Interests are stored as a JSON array in a TEXT
/// column.
pub fn load_profile(conn: &rusqlite::Connection, id: &str) -> Result<Profile, AppError> {
    conn.query_row(
        "SELECT id, full_name, age, mobile_number, email, coins, interests, description, \
         profile_image, school_name, school_email, theme_preference, created_at, updated_at \
         FROM profiles WHERE id = ?1",
        params![id],
        |row| {
            let interests_json: String = row.get(6)?;
            Ok((
                Profile {
                    id: row.get(0)?,
                    full_name: row.get(1)?,
                    age: row.get(2)?,
                    mobile_number: row.get(3)?,
                    email: row.get(4)?,
                    coins: row.get(5)?,
                    interests: Vec::new(),
                    description: row.get(7)?,
                    profile_image: row.get(8)?,
                    school_name: row.get(9)?,
                    school_email: row.get(10)?,
                    theme_preference: row.get(11)?,
                    created_at: row.get(12)?,
                    updated_at: row.get(13)?,
                },
                interests_json,
            ))
        },
    )
    .map_err(|_| AppError::NotFound)
    .map(|(mut profile, interests_json)| {
        profile.interests = serde_json::from_str(&interests_json).unwrap_or_default();
        profile
    })
}

/// GET /profile — the caller's own profile, coins included.
async fn get_profile(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Profile>> {
    let conn = state.db.get()?;
    Ok(Json(load_profile(&conn, &user.id)?))
}

/// PUT /profile — update the caller's profile. Coins and role are not on
/// this surface at all.
async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<Profile>> {
    let full_name = req.full_name.trim().to_string();
    if full_name.is_empty() || full_name.len() > 100 {
        return Err(AppError::BadRequest("Name is required".into()));
    }
    if !(1..=120).contains(&req.age) {
        return Err(AppError::BadRequest("Age must be between 1 and 120".into()));
    }
    if req.mobile_number.trim().is_empty() {
        return Err(AppError::BadRequest("Phone number is required".into()));
    }
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    if let Some(desc) = &req.description {
        if desc.len() > 500 {
            return Err(AppError::BadRequest(
                "Description must be 500 characters or less".into(),
            ));
        }
    }
    let theme = req.theme_preference.as_deref().unwrap_or("light");
    if theme != "light" && theme != "dark" {
        return Err(AppError::BadRequest("Unknown theme preference".into()));
    }

    let interests = if user.role == Role::Senior {
        validate_interests(&req.interests)?;
        serde_json::to_string(&req.interests)?
    } else {
        "[]".to_string()
    };

    let profile = {
        let conn = state.db.get()?;

        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM profiles WHERE email = ?1 AND id != ?2",
            params![email, user.id],
            |row| row.get(0),
        )?;
        if taken {
            return Err(AppError::BadRequest("Email is already registered".into()));
        }

        conn.execute(
            "UPDATE profiles SET full_name = ?1, age = ?2, mobile_number = ?3, email = ?4, \
             description = ?5, interests = ?6, theme_preference = ?7, updated_at = datetime('now') \
             WHERE id = ?8",
            params![
                full_name,
                req.age,
                req.mobile_number.trim(),
                email,
                req.description,
                interests,
                theme,
                user.id,
            ],
        )?;

        load_profile(&conn, &user.id)?
    };

    state.events.publish(ChangeEvent {
        table: ChangeTable::Profiles,
        op: ChangeOp::Update,
        row_id: user.id.clone(),
        owner_id: user.id,
        audience_id: None,
    });

    Ok(Json(profile))
}

/// POST /profile/avatar — multipart image upload, at most 5 MiB.
async fn upload_avatar(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let mut stored: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let is_image = field
            .content_type()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(AppError::BadRequest("Please upload an image file".into()));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;
        if data.len() > MAX_AVATAR_BYTES {
            return Err(AppError::BadRequest("Image must be less than 5MB".into()));
        }

        stored = Some(storage::save_upload(
            state.config.uploads_path(),
            &user.id,
            &file_name,
            &data,
        )?);
        break;
    }

    let url = stored.ok_or_else(|| AppError::BadRequest("No file in upload".into()))?;

    {
        let conn = state.db.get()?;
        conn.execute(
            "UPDATE profiles SET profile_image = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![url, user.id],
        )?;
    }

    state.events.publish(ChangeEvent {
        table: ChangeTable::Profiles,
        op: ChangeOp::Update,
        row_id: user.id.clone(),
        owner_id: user.id,
        audience_id: None,
    });

    Ok(Json(serde_json::json!({ "profile_image": url })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route(
            "/profile/avatar",
            post(upload_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 1024)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn seed_senior(conn: &rusqlite::Connection) {
        conn.execute(
            "INSERT INTO profiles (id, full_name, age, mobile_number, email, password_hash, interests)
             VALUES ('u1', 'Asha', 70, '123', 'asha@example.com', 'x', '[\"Cooking\"]')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn load_profile_parses_interests() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        seed_senior(&conn);

        let profile = load_profile(&conn, "u1").unwrap();
        assert_eq!(profile.full_name, "Asha");
        assert_eq!(profile.interests, vec!["Cooking".to_string()]);
        assert_eq!(profile.coins, 0);
    }

    #[test]
    fn load_profile_missing_user_is_not_found() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        assert!(matches!(
            load_profile(&conn, "ghost"),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn malformed_interests_column_degrades_to_empty() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO profiles (id, full_name, age, mobile_number, email, password_hash, interests)
             VALUES ('u2', 'Ravi', 65, '456', 'ravi@example.com', 'x', 'not-json')",
            [],
        )
        .unwrap();

        let profile = load_profile(&conn, "u2").unwrap();
        assert!(profile.interests.is_empty());
    }
}
