use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, RepoError},
    extract::JsonBody,
    models::{Category, Genre, SearchFilter, SlugRequest},
    pagination::{Page, PageRequest},
    validation::validate_slug_request,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

/// Maps a slug uniqueness violation onto the `slug` field.
fn slug_conflict(kind: &str) -> impl FnOnce(RepoError) -> ApiError + '_ {
    move |err| match err {
        RepoError::Conflict(_) => {
            ApiError::field("slug", format!("{kind} with this slug already exists."))
        }
        other => other.into(),
    }
}

// --- Categories ---

/// list_categories
///
/// [Public Route] Paginated categories ordered by name, with `?search=` on the name.
#[utoipa::path(
    get,
    path = "/api/v1/categories/",
    params(SearchFilter),
    responses((status = 200, description = "Categories", body = Page<Category>))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(filter): Query<SearchFilter>,
) -> Result<Json<Page<Category>>, ApiError> {
    let page = PageRequest::new(filter.page, state.config.page_size)?;
    let (items, count) = state
        .repo
        .list_categories(filter.search, page.limit(), page.offset())
        .await;
    Ok(Json(page.into_page(items, count)?))
}

/// create_category
///
/// [Admin] Adds a category. Duplicate slugs are rejected with 400.
#[utoipa::path(
    post,
    path = "/api/v1/categories/",
    request_body = SlugRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 400, description = "Invalid payload or duplicate slug"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_category(
    user: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SlugRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    user.require_admin()?;
    validate_slug_request(&payload)?;
    let category = state
        .repo
        .create_category(payload)
        .await
        .map_err(slug_conflict("category"))?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// delete_category
///
/// [Admin] Removes a category by slug. Its titles remain, uncategorized.
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{slug}/",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    user: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require_admin()?;
    if state.repo.delete_category(&slug).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}

// --- Genres ---

/// list_genres
///
/// [Public Route] Paginated genres ordered by name, with `?search=` on the name.
#[utoipa::path(
    get,
    path = "/api/v1/genres/",
    params(SearchFilter),
    responses((status = 200, description = "Genres", body = Page<Genre>))
)]
pub async fn list_genres(
    State(state): State<AppState>,
    Query(filter): Query<SearchFilter>,
) -> Result<Json<Page<Genre>>, ApiError> {
    let page = PageRequest::new(filter.page, state.config.page_size)?;
    let (items, count) = state
        .repo
        .list_genres(filter.search, page.limit(), page.offset())
        .await;
    Ok(Json(page.into_page(items, count)?))
}

#[utoipa::path(
    post,
    path = "/api/v1/genres/",
    request_body = SlugRequest,
    responses(
        (status = 201, description = "Created", body = Genre),
        (status = 400, description = "Invalid payload or duplicate slug"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_genre(
    user: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SlugRequest>,
) -> Result<(StatusCode, Json<Genre>), ApiError> {
    user.require_admin()?;
    validate_slug_request(&payload)?;
    let genre = state
        .repo
        .create_genre(payload)
        .await
        .map_err(slug_conflict("genre"))?;
    Ok((StatusCode::CREATED, Json(genre)))
}

/// delete_genre
///
/// [Admin] Removes a genre by slug and detaches it from every title.
#[utoipa::path(
    delete,
    path = "/api/v1/genres/{slug}/",
    params(("slug" = String, Path, description = "Genre slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_genre(
    user: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require_admin()?;
    if state.repo.delete_genre(&slug).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}
