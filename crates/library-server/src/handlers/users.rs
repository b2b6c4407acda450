use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use library_shared::api::UpdateUserRequest;
use library_shared::{Profile, Role, User};
use uuid::Uuid;

use crate::auth::{hash_password, AuthUser};
use crate::error::AppError;
use crate::routes::AppState;
use crate::validation::{validate_age, validate_email, validate_password};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    role: Role,
    age: Option<i32>,
    avatar_url: Option<String>,
    date_joined: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            is_staff: row.role.is_staff(),
            profile: Some(Profile::new(row.role, row.age, row.avatar_url)),
            date_joined: row.date_joined,
        }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, role, age, avatar_url, date_joined";

async fn fetch_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    let row: Option<UserRow> =
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&state.db)
            .await?;

    row.map(User::from).ok_or(AppError::NotFound)
}

/// Shared partial-update logic for `/api/users/me/update/` and the
/// admin-facing `/api/users/{id}/`.
async fn apply_update(
    state: &AppState,
    target_id: Uuid,
    req: &UpdateUserRequest,
) -> Result<User, AppError> {
    if req.is_empty() {
        return fetch_user(state, target_id).await;
    }

    if let Some(ref email) = req.email {
        validate_email(email)?;
        let taken: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id != $2")
                .bind(email)
                .bind(target_id)
                .fetch_optional(&state.db)
                .await?;
        if taken.is_some() {
            return Err(AppError::field("email", "Email already in use"));
        }
    }

    if let Some(age) = req.age {
        validate_age(age)?;
    }

    let password_hash = match req.password {
        Some(ref password) => {
            validate_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let row: Option<UserRow> = sqlx::query_as(&format!(
        r#"
        UPDATE users
        SET first_name = COALESCE($1, first_name),
            last_name = COALESCE($2, last_name),
            email = COALESCE($3, email),
            age = COALESCE($4, age),
            avatar_url = COALESCE($5, avatar_url),
            password_hash = COALESCE($6, password_hash)
        WHERE id = $7
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&req.email)
    .bind(req.age)
    .bind(&req.avatar_url)
    .bind(&password_hash)
    .bind(target_id)
    .fetch_optional(&state.db)
    .await?;

    row.map(User::from).ok_or(AppError::NotFound)
}

/// GET /api/users/me/
pub async fn current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    Ok(Json(fetch_user(&state, user.id).await?))
}

/// PATCH /api/users/me/update/
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    let updated = apply_update(&state, user.id, &req).await?;
    Ok(Json(updated))
}

/// GET /api/users/ (admin only).
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<User>>, AppError> {
    if !user.role.can_manage_users() {
        return Err(AppError::Forbidden);
    }

    let rows: Vec<UserRow> =
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))
            .fetch_all(&state.db)
            .await?;

    Ok(Json(rows.into_iter().map(User::from).collect()))
}

/// GET /api/users/:id/ (admin only).
pub async fn get_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    if !user.role.can_manage_users() {
        return Err(AppError::Forbidden);
    }

    Ok(Json(fetch_user(&state, id).await?))
}

/// PATCH /api/users/:id/ (admin only).
pub async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    if !user.role.can_manage_users() {
        return Err(AppError::Forbidden);
    }

    let updated = apply_update(&state, id, &req).await?;
    Ok(Json(updated))
}

/// DELETE /api/users/:id/ (admin only). Deleting yourself is rejected.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !user.role.can_manage_users() {
        return Err(AppError::Forbidden);
    }

    if id == user.id {
        return Err(AppError::Validation(
            "You cannot delete your own account".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
