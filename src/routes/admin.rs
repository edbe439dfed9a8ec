use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Admin Router Module
///
/// Catalogue management and account administration. The router layer only
/// authenticates; each handler calls `require_admin`, so a signed-in user
/// without the admin role gets 403 rather than 401.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Catalogue ---
        .route("/categories/", post(handlers::create_category))
        .route("/categories/{slug}/", delete(handlers::delete_category))
        .route("/genres/", post(handlers::create_genre))
        .route("/genres/{slug}/", delete(handlers::delete_genre))
        .route("/titles/", post(handlers::create_title))
        .route(
            "/titles/{title_id}/",
            patch(handlers::update_title).delete(handlers::delete_title),
        )
        // --- Accounts ---
        .route(
            "/users/",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/users/{username}/",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
}
