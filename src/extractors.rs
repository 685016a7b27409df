use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use rusqlite::params;

use crate::db::models::Role;
use crate::error::AppError;
use crate::state::AppState;

/// The currently authenticated user, resolved once at route entry from the
/// session cookie through sessions ⋈ profiles ⋈ user_roles.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub full_name: String,
    pub role: Role,
}

impl CurrentUser {
    /// Reject with 403 unless the user holds the given role.
    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session is found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(parts, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        let conn = state.db.get()?;
        conn.query_row(
            "SELECT p.id, p.full_name, r.role FROM sessions s \
             JOIN profiles p ON p.id = s.user_id \
             JOIN user_roles r ON r.user_id = p.id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| {
                let role_str: String = row.get(2)?;
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, role_str))
            },
        )
        .map_err(|_| AppError::Unauthorized)
        .and_then(|(id, full_name, role_str)| {
            let role = Role::parse(&role_str).ok_or(AppError::Unauthorized)?;
            Ok(CurrentUser {
                id,
                full_name,
                role,
            })
        })
    }
}

/// Optional user extractor — returns None instead of 401 when not
/// authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(_) => Ok(MaybeUser(None)),
        }
    }
}

fn extract_session_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_cookie(value: &str) -> Parts {
        let request = Request::builder()
            .header(header::COOKIE, value)
            .body(())
            .unwrap();
        request.into_parts().0
    }

    #[test]
    fn finds_token_among_other_cookies() {
        let parts = parts_with_cookie("theme=dark; legacygen_session=abc123; lang=en");
        assert_eq!(
            extract_session_token(&parts, "legacygen_session"),
            Some("abc123")
        );
    }

    #[test]
    fn missing_cookie_yields_none() {
        let parts = parts_with_cookie("theme=dark");
        assert_eq!(extract_session_token(&parts, "legacygen_session"), None);
    }

    #[test]
    fn require_role_enforces_match() {
        let user = CurrentUser {
            id: "u1".to_string(),
            full_name: "Asha".to_string(),
            role: Role::Senior,
        };
        assert!(user.require_role(Role::Senior).is_ok());
        assert!(matches!(
            user.require_role(Role::School),
            Err(AppError::Forbidden)
        ));
    }
}
