use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, RepoError},
    extract::JsonBody,
    models::{Comment, CommentRequest, PageParams, Review, ReviewRequest},
    pagination::{Page, PageRequest},
    validation::{validate_comment, validate_review},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

// --- Reviews ---

/// list_reviews
///
/// [Public Route] Reviews of one title, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/",
    params(("title_id" = i64, Path, description = "Title ID"), PageParams),
    responses(
        (status = 200, description = "Reviews", body = Page<Review>),
        (status = 404, description = "Title not found")
    )
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Review>>, ApiError> {
    super::require_title(&state.repo, title_id).await?;
    let page = PageRequest::new(params.page, state.config.page_size)?;
    let (items, count) = state
        .repo
        .list_reviews(title_id, page.limit(), page.offset())
        .await;
    Ok(Json(page.into_page(items, count)?))
}

#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    responses(
        (status = 200, description = "Found", body = Review),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<Json<Review>, ApiError> {
    Ok(Json(
        super::require_review(&state.repo, title_id, review_id).await?,
    ))
}

/// create_review
///
/// [Authenticated Route] Reviews a title as the requester. One review per
/// (title, author); a second attempt is a 400.
#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews/",
    params(("title_id" = i64, Path, description = "Title ID")),
    request_body = ReviewRequest,
    responses(
        (status = 201, description = "Created", body = Review),
        (status = 400, description = "Invalid payload or already reviewed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Title not found")
    )
)]
pub async fn create_review(
    user: AuthUser,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    JsonBody(payload): JsonBody<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    super::require_title(&state.repo, title_id).await?;
    let (text, score) = validate_review(&payload, false)?;

    let review = state
        .repo
        .create_review(
            title_id,
            user.id,
            text.unwrap_or_default(),
            score.unwrap_or_default(),
        )
        .await
        .map_err(|err| match err {
            RepoError::Conflict(_) => ApiError::field(
                "non_field_errors",
                "You have already reviewed this title.",
            ),
            other => other.into(),
        })?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// update_review
///
/// [Authenticated Route] Partial update by the author, a moderator or an admin.
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Updated", body = Review),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_review(
    user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    JsonBody(payload): JsonBody<ReviewRequest>,
) -> Result<Json<Review>, ApiError> {
    let review = super::require_review(&state.repo, title_id, review_id).await?;
    user.require_author_or_staff(review.author_id)?;
    let (text, score) = validate_review(&payload, true)?;

    state
        .repo
        .update_review(review.id, text, score)
        .await?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_review(
    user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let review = super::require_review(&state.repo, title_id, review_id).await?;
    user.require_author_or_staff(review.author_id)?;
    if state.repo.delete_review(review.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}

// --- Comments ---

/// Resolves the full title → review → comment chain.
async fn require_comment(
    state: &AppState,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<Comment, ApiError> {
    super::require_review(&state.repo, title_id, review_id).await?;
    state
        .repo
        .get_comment(review_id, comment_id)
        .await
        .ok_or_else(ApiError::not_found)
}

/// list_comments
///
/// [Public Route] Comments on one review, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID"),
        PageParams
    ),
    responses(
        (status = 200, description = "Comments", body = Page<Comment>),
        (status = 404, description = "Title or review not found")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Comment>>, ApiError> {
    super::require_review(&state.repo, title_id, review_id).await?;
    let page = PageRequest::new(params.page, state.config.page_size)?;
    let (items, count) = state
        .repo
        .list_comments(review_id, page.limit(), page.offset())
        .await;
    Ok(Json(page.into_page(items, count)?))
}

#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Found", body = Comment),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_comment(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(
        require_comment(&state, title_id, review_id, comment_id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Created", body = Comment),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Title or review not found")
    )
)]
pub async fn create_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    JsonBody(payload): JsonBody<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    super::require_review(&state.repo, title_id, review_id).await?;
    let text = validate_comment(&payload, false)?;
    let comment = state
        .repo
        .create_comment(review_id, user.id, text.unwrap_or_default())
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    JsonBody(payload): JsonBody<CommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let comment = require_comment(&state, title_id, review_id, comment_id).await?;
    user.require_author_or_staff(comment.author_id)?;
    let text = validate_comment(&payload, true)?;
    state
        .repo
        .update_comment(comment.id, text)
        .await?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let comment = require_comment(&state, title_id, review_id, comment_id).await?;
    user.require_author_or_staff(comment.author_id)?;
    if state.repo.delete_comment(comment.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}
