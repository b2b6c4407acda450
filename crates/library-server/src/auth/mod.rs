mod middleware;
mod password;
mod session;

pub use middleware::{auth_middleware, AuthUser};
pub use password::{hash_password, verify_password};
pub use session::{
    create_session, mint_token, revoke_sessions, Session, CSRF_COOKIE, CSRF_HEADER, SESSION_COOKIE,
};
