use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::auth::session;
use crate::db::models::{Role, SENIOR_INTERESTS};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// -- Request/response types --

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub age: i64,
    pub mobile_number: String,
    pub role: Role,
    #[serde(default)]
    pub interests: Vec<String>,
    pub school_name: Option<String>,
    pub school_email: Option<String>,
}

#[derive(Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub id: String,
    pub full_name: String,
    pub role: Role,
}

// -- Cookie helpers --

fn session_cookie(cookie_name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        cookie_name, token, max_age_secs
    )
}

fn clear_session_cookie(cookie_name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", cookie_name)
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

// -- Validation --

fn validate_signup(req: &SignupRequest) -> Result<(), AppError> {
    if req.role == Role::Admin {
        return Err(AppError::BadRequest("Invalid role".into()));
    }
    if req.full_name.trim().is_empty() || req.full_name.len() > 100 {
        return Err(AppError::BadRequest("Full name is required".into()));
    }
    if !(1..=120).contains(&req.age) {
        return Err(AppError::BadRequest("Age must be between 1 and 120".into()));
    }
    if req.mobile_number.trim().is_empty() {
        return Err(AppError::BadRequest("Mobile number is required".into()));
    }
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    if req.password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".into(),
        ));
    }
    match req.role {
        Role::Senior => {
            if req.interests.is_empty() {
                return Err(AppError::BadRequest(
                    "Please select at least one interest".into(),
                ));
            }
            validate_interests(&req.interests)?;
        }
        Role::School => {
            let name_ok = req
                .school_name
                .as_deref()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false);
            let email_ok = req
                .school_email
                .as_deref()
                .map(|s| s.contains('@'))
                .unwrap_or(false);
            if !name_ok || !email_ok {
                return Err(AppError::BadRequest(
                    "School name and school email are required".into(),
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

pub(crate) fn validate_interests(interests: &[String]) -> Result<(), AppError> {
    for interest in interests {
        if !SENIOR_INTERESTS.contains(&interest.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Unknown interest: {}",
                interest
            )));
        }
    }
    Ok(())
}

// -- Handlers --

/// POST /auth/signup — create profile + role row, open a session.
async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Response> {
    validate_signup(&req)?;

    let email = req.email.trim().to_lowercase();
    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)?;
    let user_id = uuid::Uuid::now_v7().to_string();
    let role_id = uuid::Uuid::now_v7().to_string();

    // Interests only apply to seniors; everyone else gets an empty set.
    let interests = if req.role == Role::Senior {
        serde_json::to_string(&req.interests)?
    } else {
        "[]".to_string()
    };
    let (school_name, school_email) = if req.role == Role::School {
        (req.school_name.as_deref(), req.school_email.as_deref())
    } else {
        (None, None)
    };

    {
        let conn = state.db.get()?;

        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM profiles WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?;
        if taken {
            return Err(AppError::BadRequest("Email is already registered".into()));
        }

        insert_profile_row(
            &conn,
            &user_id,
            req.full_name.trim(),
            req.age,
            req.mobile_number.trim(),
            &email,
            &password_hash,
            &interests,
            school_name,
            school_email,
        )?;
        // Role assignment happens here, server-side; it is never part of
        // any later update surface.
        conn.execute(
            "INSERT INTO user_roles (id, user_id, role) VALUES (?1, ?2, ?3)",
            params![role_id, user_id, req.role.as_str()],
        )?;
    }

    let token = session::create_session(&state.db, &user_id, state.config.auth.session_hours)?;
    tracing::info!(user = %user_id, role = req.role.as_str(), "new account created");

    let body = AuthResponse {
        id: user_id,
        full_name: req.full_name.trim().to_string(),
        role: req.role,
    };

    Ok((
        StatusCode::CREATED,
        [(
            header::SET_COOKIE,
            session_cookie(
                &state.config.auth.cookie_name,
                &token,
                state.config.auth.session_hours,
            ),
        )],
        Json(body),
    )
        .into_response())
}

/// Insert the profile row. Two signups racing past the email pre-check
/// both reach this insert; the loser hits the UNIQUE index and gets the
/// same 400 the pre-check gives.
#[allow(clippy::too_many_arguments)]
fn insert_profile_row(
    conn: &rusqlite::Connection,
    id: &str,
    full_name: &str,
    age: i64,
    mobile_number: &str,
    email: &str,
    password_hash: &str,
    interests: &str,
    school_name: Option<&str>,
    school_email: Option<&str>,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO profiles (id, full_name, age, mobile_number, email, password_hash, \
         interests, school_name, school_email) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            full_name,
            age,
            mobile_number,
            email,
            password_hash,
            interests,
            school_name,
            school_email,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::BadRequest("Email is already registered".into())
        }
        e => e.into(),
    })?;
    Ok(())
}

/// POST /auth/signin — verify password, open a session.
async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_lowercase();

    let (user_id, full_name, password_hash, role_str) = {
        let conn = state.db.get()?;
        conn.query_row(
            "SELECT p.id, p.full_name, p.password_hash, r.role \
             FROM profiles p JOIN user_roles r ON r.user_id = p.id \
             WHERE p.email = ?1",
            params![email],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .map_err(|_| AppError::Unauthorized)?
    };

    if !bcrypt::verify(&req.password, &password_hash)? {
        return Err(AppError::Unauthorized);
    }
    let role = Role::parse(&role_str).ok_or(AppError::Unauthorized)?;

    let token = session::create_session(&state.db, &user_id, state.config.auth.session_hours)?;

    let body = AuthResponse {
        id: user_id,
        full_name,
        role,
    };

    Ok((
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            session_cookie(
                &state.config.auth.cookie_name,
                &token,
                state.config.auth.session_hours,
            ),
        )],
        Json(body),
    )
        .into_response())
}

/// POST /auth/signout — drop the session row and clear the cookie.
async fn signout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = cookie_value(&headers, &state.config.auth.cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )],
    )
        .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/signout", post(signout))
}
