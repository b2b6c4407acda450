use chrono::{DateTime, Utc};
use rand::RngCore;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;

/// HttpOnly cookie carrying the opaque session token.
pub const SESSION_COOKIE: &str = "sessionid";
/// Readable cookie mirroring the per-session CSRF token.
pub const CSRF_COOKIE: &str = "csrftoken";
/// Header every mutating request must echo the CSRF token in.
pub const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub csrf_token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// 32 random bytes, hex-encoded. Used for both session and CSRF tokens.
pub fn mint_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Create a fresh session row for the user and return it.
pub async fn create_session(
    db: &DbPool,
    user_id: Uuid,
    ttl_secs: i64,
) -> Result<Session, AppError> {
    let session = Session {
        token: mint_token(),
        csrf_token: mint_token(),
        user_id,
        expires_at: Utc::now() + chrono::Duration::seconds(ttl_secs),
    };

    sqlx::query(
        r#"
        INSERT INTO sessions (token, user_id, csrf_token, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(&session.token)
    .bind(session.user_id)
    .bind(&session.csrf_token)
    .bind(session.expires_at)
    .execute(db)
    .await?;

    Ok(session)
}

/// Drop every session belonging to the user.
pub async fn revoke_sessions(db: &DbPool, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_hex_and_unique() {
        let a = mint_token();
        let b = mint_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
