/// Handler Module Index
///
/// One submodule per resource. Every handler returns `Result<_, ApiError>`;
/// authorization is decided inside the handler from the `AuthUser` extractor,
/// after the authentication layer on the router has already rejected anonymous
/// writes.
pub mod accounts;
pub mod reviews;
pub mod taxonomy;
pub mod titles;
pub mod users;

pub use accounts::*;
pub use reviews::*;
pub use taxonomy::*;
pub use titles::*;
pub use users::*;

use crate::{
    error::ApiError,
    models::{Review, Title},
    repository::RepositoryState,
};

// --- Nested lookup chain ---

/// Resolves `/titles/{title_id}`; 404 if the title does not exist.
pub(crate) async fn require_title(repo: &RepositoryState, title_id: i64) -> Result<Title, ApiError> {
    repo.get_title(title_id).await.ok_or_else(ApiError::not_found)
}

/// Resolves `/titles/{title_id}/reviews/{review_id}`. The review must belong to
/// that title; a review id reached through another title is a 404.
pub(crate) async fn require_review(
    repo: &RepositoryState,
    title_id: i64,
    review_id: i64,
) -> Result<Review, ApiError> {
    require_title(repo, title_id).await?;
    repo.get_review(title_id, review_id)
        .await
        .ok_or_else(ApiError::not_found)
}
