use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use library_shared::Role;
use uuid::Uuid;

use crate::{error::AppError, routes::AppState};

use super::session::{CSRF_HEADER, SESSION_COOKIE};

/// Authenticated caller, resolved from the session cookie and attached
/// to the request as an extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

/// Resolves the session cookie to an [`AuthUser`] and, for mutating
/// methods, checks the double-submit CSRF token against the session.
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AppError::Unauthorized)?;

    let row: Option<(Uuid, String, Role, String)> = sqlx::query_as(
        r#"
        SELECT u.id, u.username, u.role, s.csrf_token
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = $1 AND s.expires_at > NOW()
        "#,
    )
    .bind(&token)
    .fetch_optional(&state.db)
    .await?;

    let (id, username, role, csrf_token) = row.ok_or(AppError::Unauthorized)?;

    if requires_csrf(request.method()) {
        let header = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::CsrfFailure)?;

        if header != csrf_token {
            return Err(AppError::CsrfFailure);
        }
    }

    request.extensions_mut().insert(AuthUser { id, username, role });

    Ok(next.run(request).await)
}

fn requires_csrf(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_methods_skip_csrf() {
        assert!(!requires_csrf(&Method::GET));
        assert!(!requires_csrf(&Method::HEAD));
        assert!(!requires_csrf(&Method::OPTIONS));
    }

    #[test]
    fn mutating_methods_require_csrf() {
        assert!(requires_csrf(&Method::POST));
        assert!(requires_csrf(&Method::PATCH));
        assert!(requires_csrf(&Method::PUT));
        assert!(requires_csrf(&Method::DELETE));
    }
}
