use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, RepoError},
    extract::JsonBody,
    models::{SearchFilter, User, UserRequest},
    pagination::{Page, PageRequest},
    validation::{validate_new_user, validate_user_patch},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

/// Maps a unique violation on `users` onto the offending field.
pub(crate) fn user_conflict(err: RepoError) -> ApiError {
    match err {
        RepoError::Conflict(constraint) if constraint.contains("email") => {
            ApiError::field("email", "A user with that email already exists.")
        }
        RepoError::Conflict(_) => {
            ApiError::field("username", "A user with that username already exists.")
        }
        other => other.into(),
    }
}

async fn require_user(state: &AppState, username: &str) -> Result<User, ApiError> {
    state
        .repo
        .get_user_by_username(username)
        .await
        .ok_or_else(ApiError::not_found)
}

// --- Admin account management ---

/// list_users
///
/// [Admin] Paginated accounts ordered by username, `?search=` on the username.
#[utoipa::path(
    get,
    path = "/api/v1/users/",
    params(SearchFilter),
    responses(
        (status = 200, description = "Accounts", body = Page<User>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<SearchFilter>,
) -> Result<Json<Page<User>>, ApiError> {
    user.require_admin()?;
    let page = PageRequest::new(filter.page, state.config.page_size)?;
    let (items, count) = state
        .repo
        .list_users(filter.search, page.limit(), page.offset())
        .await;
    Ok(Json(page.into_page(items, count)?))
}

/// create_user
///
/// [Admin] Creates an account directly. No confirmation mail is sent; the user
/// obtains a code through signup with the same username and email.
#[utoipa::path(
    post,
    path = "/api/v1/users/",
    request_body = UserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 400, description = "Invalid payload or taken username/email"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_user(
    user: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    user.require_admin()?;
    let new_user = validate_new_user(&payload)?;
    let created = state
        .repo
        .create_user(new_user)
        .await
        .map_err(user_conflict)?;
    tracing::info!(admin = %user.username, username = %created.username, "account created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{username}/",
    params(("username" = String, Path, description = "Account username")),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<User>, ApiError> {
    user.require_admin()?;
    Ok(Json(require_user(&state, &username).await?))
}

/// update_user
///
/// [Admin] Partial update of any account, role included.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{username}/",
    params(("username" = String, Path, description = "Account username")),
    request_body = UserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Invalid payload or taken username/email"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    JsonBody(payload): JsonBody<UserRequest>,
) -> Result<Json<User>, ApiError> {
    user.require_admin()?;
    let target = require_user(&state, &username).await?;
    let patch = validate_user_patch(&payload, true)?;
    state
        .repo
        .update_user(target.id, patch)
        .await
        .map_err(user_conflict)?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{username}/",
    params(("username" = String, Path, description = "Account username")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require_admin()?;
    let target = require_user(&state, &username).await?;
    if state.repo.delete_user(target.id).await? {
        tracing::info!(admin = %user.username, username = %target.username, "account deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}

// --- Own profile ---

/// get_me
///
/// [Authenticated Route] The requester's own account.
#[utoipa::path(
    get,
    path = "/api/v1/users/me/",
    responses(
        (status = 200, description = "Own account", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    state
        .repo
        .get_user(user.id)
        .await
        .map(Json)
        .ok_or(ApiError::Unauthorized)
}

/// update_me
///
/// [Authenticated Route] Edits the requester's own profile. A submitted `role`
/// is ignored.
#[utoipa::path(
    patch,
    path = "/api/v1/users/me/",
    request_body = UserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Invalid payload or taken username/email"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UserRequest>,
) -> Result<Json<User>, ApiError> {
    let patch = validate_user_patch(&payload, false)?;
    state
        .repo
        .update_user(user.id, patch)
        .await
        .map_err(user_conflict)?
        .map(Json)
        .ok_or(ApiError::Unauthorized)
}
