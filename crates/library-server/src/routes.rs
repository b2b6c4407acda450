use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::auth::auth_middleware;
use crate::config::Config;
use crate::db::DbPool;
use crate::handlers::{auth as auth_handlers, books as book_handlers, users as user_handlers};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
}

pub fn create_router(db: DbPool, config: Config) -> Router {
    let static_dir = config.static_dir.clone();
    let state = AppState { db, config };

    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/api/auth/register/", post(auth_handlers::register))
        .route("/api/auth/login/", post(auth_handlers::login));

    // Everything else requires a session; CSRF is enforced on mutations
    // inside the middleware.
    let protected_routes = Router::new()
        .route("/api/auth/logout/", post(auth_handlers::logout))
        .route("/api/csrf/", get(auth_handlers::csrf_token))
        .route("/api/users/me/", get(user_handlers::current_user))
        .route("/api/users/me/update/", patch(user_handlers::update_me))
        .route(
            "/api/books/",
            get(book_handlers::list_books).post(book_handlers::create_book),
        )
        .route("/api/books/borrowed/", get(book_handlers::borrowed_books))
        .route(
            "/api/books/:id/",
            get(book_handlers::get_book)
                .patch(book_handlers::update_book)
                .delete(book_handlers::delete_book),
        )
        .route("/api/books/:id/borrow/", post(book_handlers::borrow_book))
        .route("/api/books/:id/return/", post(book_handlers::return_book))
        .route("/api/users/", get(user_handlers::list_users))
        .route(
            "/api/users/:id/",
            get(user_handlers::get_user)
                .patch(user_handlers::update_user)
                .delete(user_handlers::delete_user),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
