use axum::{extract::State, http::StatusCode, Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use library_shared::api::{
    CsrfResponse, LoginRequest, MessageResponse, RegisterRequest, RegisterResponse,
};
use library_shared::Role;
use uuid::Uuid;

use crate::auth::{
    create_session, hash_password, revoke_sessions, verify_password, AuthUser, CSRF_COOKIE,
    SESSION_COOKIE,
};
use crate::error::AppError;
use crate::routes::AppState;
use crate::validation::{validate_age, validate_email, validate_password, validate_username};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    validate_username(&req.username)?;
    validate_email(&req.email)?;
    validate_password(&req.password)?;

    if req.password != req.password2 {
        return Err(AppError::field("password", "Password fields didn't match."));
    }

    if let Some(age) = req.age {
        validate_age(age)?;
    }

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(&req.username)
        .fetch_optional(&state.db)
        .await?;

    if existing.is_some() {
        return Err(AppError::field("username", "Username already exists"));
    }

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;

    if existing.is_some() {
        return Err(AppError::field("email", "Email already in use"));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();
    let role = req.role.unwrap_or(Role::User);

    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, password_hash, first_name, last_name, role, age)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(user_id)
    .bind(&req.username)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(req.first_name.as_deref().unwrap_or(""))
    .bind(req.last_name.as_deref().unwrap_or(""))
    .bind(role)
    .bind(req.age)
    .execute(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            message: "User registered successfully".to_string(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Username and password are required".to_string(),
        ));
    }

    let row: Option<(Uuid, String)> =
        sqlx::query_as("SELECT id, password_hash FROM users WHERE username = $1")
            .bind(&req.username)
            .fetch_optional(&state.db)
            .await?;

    let (user_id, password_hash) = row.ok_or(AppError::Unauthorized)?;

    if !verify_password(&req.password, &password_hash)? {
        return Err(AppError::Unauthorized);
    }

    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(&state.db)
        .await?;

    let session = create_session(&state.db, user_id, state.config.session_ttl_secs).await?;
    tracing::info!(user = %req.username, "login");

    let session_cookie = Cookie::build((SESSION_COOKIE, session.token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    let csrf_cookie = Cookie::build((CSRF_COOKIE, session.csrf_token))
        .path("/")
        .same_site(SameSite::Lax)
        .build();

    let jar = jar.add(session_cookie).add(csrf_cookie);

    Ok((
        jar,
        Json(MessageResponse {
            message: "Login successful".to_string(),
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    revoke_sessions(&state.db, user.id).await?;

    let jar = jar
        .remove(Cookie::build(SESSION_COOKIE).path("/").build())
        .remove(Cookie::build(CSRF_COOKIE).path("/").build());

    Ok((
        jar,
        Json(MessageResponse {
            message: "Logout successful".to_string(),
        }),
    ))
}

/// Returns the CSRF token bound to the caller's session, refreshing the
/// readable cookie at the same time. Clients that cannot see cookies
/// read the token from the body instead.
pub async fn csrf_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<CsrfResponse>), AppError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AppError::Unauthorized)?;

    let row: Option<(String,)> = sqlx::query_as(
        "SELECT csrf_token FROM sessions WHERE token = $1 AND expires_at > NOW()",
    )
    .bind(&token)
    .fetch_optional(&state.db)
    .await?;

    let (csrf_token,) = row.ok_or(AppError::Unauthorized)?;

    let csrf_cookie = Cookie::build((CSRF_COOKIE, csrf_token.clone()))
        .path("/")
        .same_site(SameSite::Lax)
        .build();
    let jar = jar.add(csrf_cookie);

    Ok((jar, Json(CsrfResponse { csrf_token })))
}
