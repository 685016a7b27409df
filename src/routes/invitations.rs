//! School invitations and senior responses.
//!
//! A senior's answer to an invitation is a single row keyed on
//! (invitation, senior); responding again overwrites the previous status
//! in place. There is no response history.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::models::{ResponseStatus, Role};
use crate::error::{AppError, AppResult};
use crate::events::{ChangeEvent, ChangeOp, ChangeTable};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Serialize)]
pub struct InvitationView {
    pub id: String,
    pub school_id: String,
    pub school_name: String,
    pub title: String,
    pub description: Option<String>,
    pub event_date: Option<String>,
    pub accepted_count: i64,
    /// Who accepted, embedded on the school and admin shapes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accepted_responders: Vec<ResponderSummary>,
    /// The viewing senior's own answer, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_status: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct ResponderSummary {
    pub full_name: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct ResponseView {
    pub id: String,
    pub senior_id: String,
    pub senior_name: String,
    pub status: String,
    pub responded_at: String,
}

#[derive(Deserialize)]
pub struct CreateInvitationRequest {
    pub title: String,
    pub description: Option<String>,
    pub event_date: Option<String>,
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub status: ResponseStatus,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/invitations", get(list_invitations).post(create_invitation))
        .route("/invitations/{id}", delete(delete_invitation))
        .route("/invitations/{id}/respond", post(respond))
        .route("/invitations/{id}/responses", get(list_responses))
}

/// POST /invitations — a school publishes an invitation to all seniors.
async fn create_invitation(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateInvitationRequest>,
) -> AppResult<Response> {
    user.require_role(Role::School)?;

    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Please provide a title".into()));
    }
    if let Some(date) = req.event_date.as_deref() {
        if chrono::DateTime::parse_from_rfc3339(date).is_err() {
            return Err(AppError::BadRequest(
                "Event date must be an RFC 3339 timestamp".into(),
            ));
        }
    }

    let invitation_id = uuid::Uuid::now_v7().to_string();
    {
        let conn = state.db.get()?;
        conn.execute(
            "INSERT INTO invitations (id, school_id, title, description, event_date) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![invitation_id, user.id, title, req.description, req.event_date],
        )?;
    }

    state.events.publish(ChangeEvent {
        table: ChangeTable::Invitations,
        op: ChangeOp::Insert,
        row_id: invitation_id.clone(),
        owner_id: user.id,
        audience_id: None,
    });

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": invitation_id })),
    )
        .into_response())
}

/// GET /invitations — shaped by role: schools see their own, seniors see
/// the whole feed annotated with their answer, admins see everything.
async fn list_invitations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<InvitationView>>> {
    let conn = state.db.get()?;
    let invitations = match user.role {
        Role::School => query_invitations(&conn, Some(&user.id), None)?,
        Role::Senior => query_invitations(&conn, None, Some(&user.id))?,
        Role::Admin => query_invitations(&conn, None, None)?,
        Role::Student => return Err(AppError::Forbidden),
    };
    Ok(Json(invitations))
}

/// POST /invitations/{id}/respond — accept or reject. A repeat response
/// replaces the earlier one.
async fn respond(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<RespondRequest>,
) -> AppResult<Json<serde_json::Value>> {
    user.require_role(Role::Senior)?;

    let (school_id, response_id, op) = {
        let conn = state.db.get()?;
        respond_to_invitation(&conn, &id, &user.id, req.status)?
    };

    state.events.publish(ChangeEvent {
        table: ChangeTable::InvitationResponses,
        op,
        row_id: response_id,
        owner_id: user.id,
        audience_id: Some(school_id),
    });

    Ok(Json(serde_json::json!({ "status": req.status })))
}

/// GET /invitations/{id}/responses — the owning school (or an admin)
/// reviews who answered.
async fn list_responses(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let school_id: String = conn
        .query_row(
            "SELECT school_id FROM invitations WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;

    if school_id != user.id && user.role != Role::Admin {
        return Err(AppError::Forbidden);
    }

    let responses = query_responses(&conn, &id)?;
    let accepted_count = responses
        .iter()
        .filter(|r| r.status == ResponseStatus::Accepted.as_str())
        .count();

    Ok(Json(serde_json::json!({
        "responses": responses,
        "accepted_count": accepted_count,
    })))
}

/// DELETE /invitations/{id} — owning school or admin. Responses go with
/// it via the cascade.
async fn delete_invitation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let school_id = {
        let conn = state.db.get()?;
        let school_id: String = conn
            .query_row(
                "SELECT school_id FROM invitations WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .map_err(|_| AppError::NotFound)?;

        if school_id != user.id && user.role != Role::Admin {
            return Err(AppError::Forbidden);
        }

        conn.execute("DELETE FROM invitations WHERE id = ?1", params![id])?;
        school_id
    };

    state.events.publish(ChangeEvent {
        table: ChangeTable::Invitations,
        op: ChangeOp::Delete,
        row_id: id,
        owner_id: school_id,
        audience_id: None,
    });

    Ok(StatusCode::NO_CONTENT.into_response())
}

// --- Write helpers ---

/// Record (or overwrite) a senior's answer. Returns the invitation's
/// school, the response row's id, and whether this was a first answer or a
/// change of mind, for the change feed.
pub fn respond_to_invitation(
    conn: &rusqlite::Connection,
    invitation_id: &str,
    senior_id: &str,
    status: ResponseStatus,
) -> Result<(String, String, ChangeOp), AppError> {
    let school_id: String = conn
        .query_row(
            "SELECT school_id FROM invitations WHERE id = ?1",
            params![invitation_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;

    let already_answered: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM invitation_responses \
         WHERE invitation_id = ?1 AND senior_id = ?2",
        params![invitation_id, senior_id],
        |r| r.get(0),
    )?;

    let response_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO invitation_responses (id, invitation_id, senior_id, status) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (invitation_id, senior_id) DO UPDATE SET \
             status = excluded.status, \
             responded_at = datetime('now')",
        params![response_id, invitation_id, senior_id, status.as_str()],
    )?;

    // On overwrite the surviving row keeps its original id.
    let row_id: String = conn.query_row(
        "SELECT id FROM invitation_responses WHERE invitation_id = ?1 AND senior_id = ?2",
        params![invitation_id, senior_id],
        |r| r.get(0),
    )?;

    let op = if already_answered {
        ChangeOp::Update
    } else {
        ChangeOp::Insert
    };
    Ok((school_id, row_id, op))
}

// --- Query helpers ---

pub fn query_invitations(
    conn: &rusqlite::Connection,
    school_filter: Option<&str>,
    viewer_senior: Option<&str>,
) -> Result<Vec<InvitationView>, AppError> {
    let school = school_filter.unwrap_or("");
    let senior = viewer_senior.unwrap_or("");

    let mut stmt = conn.prepare(
        "SELECT i.id, i.school_id, p.full_name, i.title, i.description, i.event_date,
                COALESCE((SELECT COUNT(*) FROM invitation_responses r
                          WHERE r.invitation_id = i.id AND r.status = 'accepted'), 0) as accepted_count,
                (SELECT r.status FROM invitation_responses r
                 WHERE r.invitation_id = i.id AND r.senior_id = ?2) as my_status,
                i.created_at
         FROM invitations i
         JOIN profiles p ON p.id = i.school_id
         WHERE (?1 = '' OR i.school_id = ?1)
         ORDER BY i.created_at DESC",
    )?;

    let mut invitations: Vec<InvitationView> = stmt
        .query_map(params![school, senior], |row| {
            Ok(InvitationView {
                id: row.get(0)?,
                school_id: row.get(1)?,
                school_name: row.get(2)?,
                title: row.get(3)?,
                description: row.get(4)?,
                event_date: row.get(5)?,
                accepted_count: row.get(6)?,
                accepted_responders: Vec::new(),
                my_status: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    // The school and admin shapes carry who accepted right on the card;
    // the senior feed only carries the viewer's own answer.
    if viewer_senior.is_none() {
        for invitation in &mut invitations {
            invitation.accepted_responders = query_accepted_responders(conn, &invitation.id)?;
        }
    }

    Ok(invitations)
}

fn query_accepted_responders(
    conn: &rusqlite::Connection,
    invitation_id: &str,
) -> Result<Vec<ResponderSummary>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT p.full_name, p.email
         FROM invitation_responses r
         JOIN profiles p ON p.id = r.senior_id
         WHERE r.invitation_id = ?1 AND r.status = 'accepted'
         ORDER BY r.responded_at DESC",
    )?;

    let responders = stmt
        .query_map(params![invitation_id], |row| {
            Ok(ResponderSummary {
                full_name: row.get(0)?,
                email: row.get(1)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(responders)
}

pub fn query_responses(
    conn: &rusqlite::Connection,
    invitation_id: &str,
) -> Result<Vec<ResponseView>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.senior_id, p.full_name, r.status, r.responded_at
         FROM invitation_responses r
         JOIN profiles p ON p.id = r.senior_id
         WHERE r.invitation_id = ?1
         ORDER BY r.responded_at DESC",
    )?;

    let responses = stmt
        .query_map(params![invitation_id], |row| {
            Ok(ResponseView {
                id: row.get(0)?,
                senior_id: row.get(1)?,
                senior_name: row.get(2)?,
                status: row.get(3)?,
                responded_at: row.get(4)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(responses)
}
