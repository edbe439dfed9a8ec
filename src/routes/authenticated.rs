use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Writes open to any signed-in user. Editing or deleting a review or comment
/// additionally requires being its author, a moderator or an admin; that check
/// is made in the handler once the target has been loaded.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PATCH /users/me/
        // Own profile. Matched before the admin `/users/{username}/` route.
        .route(
            "/users/me/",
            get(handlers::get_me).patch(handlers::update_me),
        )
        // POST /titles/{title_id}/reviews/
        // One review per title and author.
        .route("/titles/{title_id}/reviews/", post(handlers::create_review))
        .route(
            "/titles/{title_id}/reviews/{review_id}/",
            patch(handlers::update_review).delete(handlers::delete_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/",
            post(handlers::create_comment),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
            patch(handlers::update_comment).delete(handlers::delete_comment),
        )
}
