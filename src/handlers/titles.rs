use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::JsonBody,
    models::{Title, TitleFilter, TitleRequest, TitleWrite},
    pagination::{Page, PageRequest},
    repository::RepositoryState,
    validation::{Validator, validate_title},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

/// Resolves the category and genre slugs of a validated payload to row ids.
/// Unknown slugs are reported on their field.
async fn resolve_title_write(
    repo: &RepositoryState,
    req: TitleRequest,
    year: Option<i16>,
) -> Result<TitleWrite, ApiError> {
    let mut v = Validator::new();

    let category_id = match &req.category {
        Some(slug) => match repo.get_category_by_slug(slug).await {
            Some(category) => Some(category.id),
            None => {
                v.add("category", format!("Object with slug={slug} does not exist."));
                None
            }
        },
        None => None,
    };

    let genre_ids = match &req.genre {
        Some(slugs) => {
            let mut wanted = slugs.clone();
            wanted.sort();
            wanted.dedup();
            let found = repo.get_genres_by_slugs(&wanted).await;
            for slug in &wanted {
                if !found.iter().any(|g| &g.slug == slug) {
                    v.add("genre", format!("Object with slug={slug} does not exist."));
                }
            }
            Some(found.into_iter().map(|g| g.id).collect())
        }
        None => None,
    };

    v.finish()?;
    Ok(TitleWrite {
        name: req.name,
        year,
        description: req.description,
        category_id,
        genre_ids,
    })
}

/// list_titles
///
/// [Public Route] Paginated titles, best rated first. Filters: `genre` and
/// `category` by slug, `name` substring, exact `year`.
#[utoipa::path(
    get,
    path = "/api/v1/titles/",
    params(TitleFilter),
    responses((status = 200, description = "Titles", body = Page<Title>))
)]
pub async fn list_titles(
    State(state): State<AppState>,
    Query(filter): Query<TitleFilter>,
) -> Result<Json<Page<Title>>, ApiError> {
    let page = PageRequest::new(filter.page, state.config.page_size)?;
    let (items, count) = state
        .repo
        .list_titles(&filter, page.limit(), page.offset())
        .await;
    Ok(Json(page.into_page(items, count)?))
}

#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/",
    params(("title_id" = i64, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Found", body = Title),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_title(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> Result<Json<Title>, ApiError> {
    Ok(Json(super::require_title(&state.repo, title_id).await?))
}

/// create_title
///
/// [Admin] Adds a title. `genre` is a list of genre slugs, `category` a category slug.
#[utoipa::path(
    post,
    path = "/api/v1/titles/",
    request_body = TitleRequest,
    responses(
        (status = 201, description = "Created", body = Title),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_title(
    user: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<TitleRequest>,
) -> Result<(StatusCode, Json<Title>), ApiError> {
    user.require_admin()?;
    let year = validate_title(&payload, false)?;
    let write = resolve_title_write(&state.repo, payload, year).await?;
    let title = state.repo.create_title(write).await?;
    Ok((StatusCode::CREATED, Json(title)))
}

/// update_title
///
/// [Admin] Partial update. A submitted `genre` list replaces the current genres.
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/",
    params(("title_id" = i64, Path, description = "Title ID")),
    request_body = TitleRequest,
    responses(
        (status = 200, description = "Updated", body = Title),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_title(
    user: AuthUser,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    JsonBody(payload): JsonBody<TitleRequest>,
) -> Result<Json<Title>, ApiError> {
    user.require_admin()?;
    super::require_title(&state.repo, title_id).await?;
    let year = validate_title(&payload, true)?;
    let write = resolve_title_write(&state.repo, payload, year).await?;
    state
        .repo
        .update_title(title_id, write)
        .await?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

/// delete_title
///
/// [Admin] Removes a title together with its reviews and their comments.
#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/",
    params(("title_id" = i64, Path, description = "Title ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_title(
    user: AuthUser,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require_admin()?;
    if state.repo.delete_title(title_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}
