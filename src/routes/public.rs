use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Everything an anonymous client may do: register, exchange a confirmation
/// code for a token, and read the catalogue with its reviews and comments.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // --- Registration ---
        .route("/auth/signup/", post(handlers::signup))
        .route("/auth/token/", post(handlers::obtain_token))
        // --- Catalogue ---
        .route("/categories/", get(handlers::list_categories))
        .route("/genres/", get(handlers::list_genres))
        // GET /titles/?genre=&category=&name=&year=&page=
        .route("/titles/", get(handlers::list_titles))
        .route("/titles/{title_id}/", get(handlers::get_title))
        // --- Reviews & Comments (read side) ---
        .route("/titles/{title_id}/reviews/", get(handlers::list_reviews))
        .route(
            "/titles/{title_id}/reviews/{review_id}/",
            get(handlers::get_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/",
            get(handlers::list_comments),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
            get(handlers::get_comment),
        )
}
