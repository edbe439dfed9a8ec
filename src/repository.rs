use crate::{
    error::RepoError,
    models::{
        Category, Comment, Genre, NewUser, Review, SlugRequest, Title, TitleFilter, TitleWrite,
        User, UserPatch,
    },
};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use std::collections::HashMap;
use std::sync::Arc;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only ever see
/// `Arc<dyn Repository>`, so tests swap in an in-memory implementation.
///
/// Read methods log database failures and degrade to empty results. Writes
/// return `RepoError`, so a failed statement surfaces as a 500 and a uniqueness
/// violation can be reported against the offending field.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> Option<User>;
    async fn get_user_by_username(&self, username: &str) -> Option<User>;
    async fn get_user_by_email(&self, email: &str) -> Option<User>;
    // Ordered by username; `search` is a case-insensitive substring of the username.
    async fn list_users(&self, search: Option<String>, limit: i64, offset: i64)
    -> (Vec<User>, i64);
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;
    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<Option<User>, RepoError>;
    async fn delete_user(&self, id: i64) -> Result<bool, RepoError>;
    // Replaces the stored confirmation code.
    async fn set_confirmation_code(&self, id: i64, code: &str) -> Result<bool, RepoError>;
    async fn get_confirmation_code(&self, id: i64) -> Option<String>;

    // --- Categories & Genres ---
    async fn list_categories(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> (Vec<Category>, i64);
    async fn get_category_by_slug(&self, slug: &str) -> Option<Category>;
    async fn create_category(&self, req: SlugRequest) -> Result<Category, RepoError>;
    async fn delete_category(&self, slug: &str) -> Result<bool, RepoError>;

    async fn list_genres(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> (Vec<Genre>, i64);
    // Returns only the slugs that exist; callers compare lengths to detect unknowns.
    async fn get_genres_by_slugs(&self, slugs: &[String]) -> Vec<Genre>;
    async fn create_genre(&self, req: SlugRequest) -> Result<Genre, RepoError>;
    async fn delete_genre(&self, slug: &str) -> Result<bool, RepoError>;

    // --- Titles ---
    // Ordered by rating descending, unrated titles last.
    async fn list_titles(&self, filter: &TitleFilter, limit: i64, offset: i64)
    -> (Vec<Title>, i64);
    async fn get_title(&self, id: i64) -> Option<Title>;
    async fn create_title(&self, title: TitleWrite) -> Result<Title, RepoError>;
    // `genre_ids: Some` replaces the whole genre set.
    async fn update_title(&self, id: i64, title: TitleWrite) -> Result<Option<Title>, RepoError>;
    async fn delete_title(&self, id: i64) -> Result<bool, RepoError>;

    // --- Reviews ---
    // Newest first.
    async fn list_reviews(&self, title_id: i64, limit: i64, offset: i64) -> (Vec<Review>, i64);
    // Only matches a review that belongs to `title_id`.
    async fn get_review(&self, title_id: i64, review_id: i64) -> Option<Review>;
    // Conflict when the author already reviewed the title.
    async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        text: String,
        score: i16,
    ) -> Result<Review, RepoError>;
    async fn update_review(
        &self,
        review_id: i64,
        text: Option<String>,
        score: Option<i16>,
    ) -> Result<Option<Review>, RepoError>;
    async fn delete_review(&self, review_id: i64) -> Result<bool, RepoError>;

    // --- Comments ---
    async fn list_comments(&self, review_id: i64, limit: i64, offset: i64)
    -> (Vec<Comment>, i64);
    async fn get_comment(&self, review_id: i64, comment_id: i64) -> Option<Comment>;
    async fn create_comment(
        &self,
        review_id: i64,
        author_id: i64,
        text: String,
    ) -> Result<Comment, RepoError>;
    async fn update_comment(
        &self,
        comment_id: i64,
        text: Option<String>,
    ) -> Result<Option<Comment>, RepoError>;
    async fn delete_comment(&self, comment_id: i64) -> Result<bool, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, bio, role, is_superuser";

const TITLE_SELECT: &str = r#"
    SELECT
        t.id, t.name, t.year, t.description,
        (SELECT AVG(r.score)::float8 FROM reviews r WHERE r.title_id = t.id) AS rating,
        c.id AS category_id, c.name AS category_name, c.slug AS category_slug
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
    WHERE 1 = 1
"#;

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.title_id, r.author_id, r.text, u.username AS author, r.score, r.pub_date
    FROM reviews r
    JOIN users u ON u.id = r.author_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.review_id, c.author_id, c.text, u.username AS author, c.pub_date
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

/// Flat `titles` row joined with its category and aggregated rating.
#[derive(Debug, FromRow)]
struct TitleRow {
    id: i64,
    name: String,
    year: i16,
    description: String,
    rating: Option<f64>,
    category_id: Option<i64>,
    category_name: Option<String>,
    category_slug: Option<String>,
}

/// One `genre_title` link resolved to its genre.
#[derive(Debug, FromRow)]
struct GenreLink {
    title_id: i64,
    id: i64,
    name: String,
    slug: String,
}

impl TitleRow {
    fn into_title(self, genre: Vec<Genre>) -> Title {
        let category = match (self.category_id, self.category_name, self.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(Category { id, name, slug }),
            _ => None,
        };
        Title {
            id: self.id,
            name: self.name,
            year: self.year,
            rating: self.rating,
            description: self.description,
            genre,
            category,
        }
    }
}

/// Builds an `ILIKE` pattern that matches `needle` as a literal substring.
/// `%`, `_` and the escape character itself lose their wildcard meaning.
pub fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Appends a case-insensitive substring match on `column`.
fn push_contains(builder: &mut QueryBuilder<'_, Postgres>, column: &str, needle: &str) {
    builder.push(format!(" AND {column} ILIKE "));
    builder.push_bind(contains_pattern(needle));
    builder.push(r" ESCAPE '\'");
}

/// Appends the `?search=` clause shared by the name/username searchable lists.
fn push_search(builder: &mut QueryBuilder<'_, Postgres>, column: &str, search: &Option<String>) {
    if let Some(s) = search {
        push_contains(builder, column, s);
    }
}

/// Appends the `GET /titles/` filters to a query whose base ends in `WHERE 1 = 1`.
fn push_title_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &TitleFilter) {
    if let Some(genre) = &filter.genre {
        builder.push(
            " AND EXISTS (SELECT 1 FROM genre_title gt JOIN genres g ON g.id = gt.genre_id \
             WHERE gt.title_id = t.id AND g.slug = ",
        );
        builder.push_bind(genre.clone());
        builder.push(")");
    }
    if let Some(category) = &filter.category {
        builder.push(" AND c.slug = ");
        builder.push_bind(category.clone());
    }
    if let Some(name) = &filter.name {
        push_contains(builder, "t.name", name);
    }
    if let Some(year) = filter.year {
        builder.push(" AND t.year = ");
        builder.push_bind(year);
    }
}

impl PostgresRepository {
    /// Runs a paginated `SELECT` plus its `COUNT(*)` twin over the same filters.
    async fn fetch_page<T>(
        &self,
        label: &str,
        mut rows: QueryBuilder<'_, Postgres>,
        mut count: QueryBuilder<'_, Postgres>,
    ) -> (Vec<T>, i64)
    where
        T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let total = match count.build_query_scalar::<i64>().fetch_one(&self.pool).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("{label} count error: {:?}", e);
                return (vec![], 0);
            }
        };
        match rows.build_query_as::<T>().fetch_all(&self.pool).await {
            Ok(items) => (items, total),
            Err(e) => {
                tracing::error!("{label} error: {:?}", e);
                (vec![], 0)
            }
        }
    }

    async fn list_slugged<T>(
        &self,
        table: &str,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> (Vec<T>, i64)
    where
        T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let mut rows = QueryBuilder::new(format!("SELECT id, name, slug FROM {table} WHERE 1 = 1"));
        push_search(&mut rows, "name", &search);
        rows.push(" ORDER BY name, id LIMIT ");
        rows.push_bind(limit);
        rows.push(" OFFSET ");
        rows.push_bind(offset);

        let mut count = QueryBuilder::new(format!("SELECT COUNT(*) FROM {table} WHERE 1 = 1"));
        push_search(&mut count, "name", &search);

        self.fetch_page(table, rows, count).await
    }

    async fn delete_by_slug(&self, table: &str, slug: &str) -> Result<bool, RepoError> {
        sqlx::query(&format!("DELETE FROM {table} WHERE slug = $1"))
            .bind(slug)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| {
                tracing::error!("delete {table} error: {:?}", e);
                RepoError::from_sqlx(e)
            })
    }

    /// Resolves the genres of each title in one round trip.
    async fn attach_genres(&self, rows: Vec<TitleRow>) -> Result<Vec<Title>, sqlx::Error> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let links = sqlx::query_as::<_, GenreLink>(
            r#"
            SELECT gt.title_id, g.id, g.name, g.slug
            FROM genre_title gt
            JOIN genres g ON g.id = gt.genre_id
            WHERE gt.title_id = ANY($1)
            ORDER BY g.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_title: HashMap<i64, Vec<Genre>> = HashMap::new();
        for link in links {
            by_title.entry(link.title_id).or_default().push(Genre {
                id: link.id,
                name: link.name,
                slug: link.slug,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let genre = by_title.remove(&row.id).unwrap_or_default();
                row.into_title(genre)
            })
            .collect())
    }

    async fn load_title(&self, id: i64) -> Result<Option<Title>, sqlx::Error> {
        let row = sqlx::query_as::<_, TitleRow>(&format!("{TITLE_SELECT} AND t.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.attach_genres(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn load_review(&self, review_id: i64) -> Result<Option<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn load_comment(&self, comment_id: i64) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Runs a single-row `DELETE` by id and reports whether a row went away.
    async fn delete_by_id(&self, table: &str, id: i64) -> Result<bool, RepoError> {
        sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| {
                tracing::error!("delete {table} error: {:?}", e);
                RepoError::from_sqlx(e)
            })
    }

    async fn find_user(&self, column: &str, value: &str) -> Option<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("find_user by {column} error: {:?}", e);
            None
        })
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: i64) -> Option<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn get_user_by_username(&self, username: &str) -> Option<User> {
        self.find_user("username", username).await
    }

    async fn get_user_by_email(&self, email: &str) -> Option<User> {
        self.find_user("email", email).await
    }

    async fn list_users(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> (Vec<User>, i64) {
        let mut rows = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1 = 1"));
        push_search(&mut rows, "username", &search);
        rows.push(" ORDER BY username LIMIT ");
        rows.push_bind(limit);
        rows.push(" OFFSET ");
        rows.push_bind(offset);

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1 = 1");
        push_search(&mut count, "username", &search);

        self.fetch_page("list_users", rows, count).await
    }

    /// create_user
    ///
    /// Inserts an account. Unique violations surface as `RepoError::Conflict`
    /// carrying `users_username_key` or `users_email_key`.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (username, email, first_name, last_name, bio, role, is_superuser)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.bio)
        .bind(user.role.as_str())
        .bind(user.is_superuser)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    /// update_user
    ///
    /// Partial update via `COALESCE`: only `Some` fields overwrite their column.
    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<Option<User>, RepoError> {
        sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users
               SET username = COALESCE($2, username),
                   email = COALESCE($3, email),
                   first_name = COALESCE($4, first_name),
                   last_name = COALESCE($5, last_name),
                   bio = COALESCE($6, bio),
                   role = COALESCE($7, role)
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .bind(patch.username)
        .bind(patch.email)
        .bind(patch.first_name)
        .bind(patch.last_name)
        .bind(patch.bio)
        .bind(patch.role.map(|r| r.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepoError> {
        self.delete_by_id("users", id).await
    }

    async fn set_confirmation_code(&self, id: i64, code: &str) -> Result<bool, RepoError> {
        sqlx::query("UPDATE users SET confirmation_code = $2 WHERE id = $1")
            .bind(id)
            .bind(code)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(RepoError::from_sqlx)
    }

    async fn get_confirmation_code(&self, id: i64) -> Option<String> {
        sqlx::query_scalar::<_, Option<String>>(
            "SELECT confirmation_code FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_confirmation_code error: {:?}", e);
            None
        })
        .flatten()
    }

    // --- CATEGORIES & GENRES ---

    async fn list_categories(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> (Vec<Category>, i64) {
        self.list_slugged("categories", search, limit, offset).await
    }

    async fn get_category_by_slug(&self, slug: &str) -> Option<Category> {
        sqlx::query_as::<_, Category>("SELECT id, name, slug FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_category_by_slug error: {:?}", e);
                None
            })
    }

    async fn create_category(&self, req: SlugRequest) -> Result<Category, RepoError> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
        )
        .bind(req.name)
        .bind(req.slug)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    /// delete_category
    ///
    /// Titles in the category keep existing with `category_id = NULL`.
    async fn delete_category(&self, slug: &str) -> Result<bool, RepoError> {
        self.delete_by_slug("categories", slug).await
    }

    async fn list_genres(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> (Vec<Genre>, i64) {
        self.list_slugged("genres", search, limit, offset).await
    }

    async fn get_genres_by_slugs(&self, slugs: &[String]) -> Vec<Genre> {
        sqlx::query_as::<_, Genre>("SELECT id, name, slug FROM genres WHERE slug = ANY($1)")
            .bind(slugs)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_genres_by_slugs error: {:?}", e);
                vec![]
            })
    }

    async fn create_genre(&self, req: SlugRequest) -> Result<Genre, RepoError> {
        sqlx::query_as::<_, Genre>(
            "INSERT INTO genres (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
        )
        .bind(req.name)
        .bind(req.slug)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    /// delete_genre
    ///
    /// The `genre_title` links cascade, so titles simply lose the genre.
    async fn delete_genre(&self, slug: &str) -> Result<bool, RepoError> {
        self.delete_by_slug("genres", slug).await
    }

    // --- TITLES ---

    /// list_titles
    ///
    /// Filters with `QueryBuilder` so every user-supplied value is bound, never
    /// interpolated.
    async fn list_titles(
        &self,
        filter: &TitleFilter,
        limit: i64,
        offset: i64,
    ) -> (Vec<Title>, i64) {
        let mut rows = QueryBuilder::new(TITLE_SELECT);
        push_title_filters(&mut rows, filter);
        rows.push(" ORDER BY rating DESC NULLS LAST, t.id LIMIT ");
        rows.push_bind(limit);
        rows.push(" OFFSET ");
        rows.push_bind(offset);

        let mut count = QueryBuilder::new(
            "SELECT COUNT(*) FROM titles t LEFT JOIN categories c ON c.id = t.category_id WHERE 1 = 1",
        );
        push_title_filters(&mut count, filter);

        let (rows, total) = self.fetch_page::<TitleRow>("list_titles", rows, count).await;
        match self.attach_genres(rows).await {
            Ok(titles) => (titles, total),
            Err(e) => {
                tracing::error!("list_titles genres error: {:?}", e);
                (vec![], 0)
            }
        }
    }

    async fn get_title(&self, id: i64) -> Option<Title> {
        self.load_title(id).await.unwrap_or_else(|e| {
            tracing::error!("get_title error: {:?}", e);
            None
        })
    }

    /// create_title
    ///
    /// Inserts the title and its genre links in one transaction.
    async fn create_title(&self, title: TitleWrite) -> Result<Title, RepoError> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO titles (name, year, description, category_id)
               VALUES ($1, $2, $3, $4) RETURNING id"#,
        )
        .bind(title.name.unwrap_or_default())
        .bind(title.year.unwrap_or_default())
        .bind(title.description.unwrap_or_default())
        .bind(title.category_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        let genre_ids = title.genre_ids.unwrap_or_default();
        sqlx::query(
            "INSERT INTO genre_title (title_id, genre_id) SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(&genre_ids)
        .execute(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        tx.commit().await?;

        self.load_title(id)
            .await?
            .ok_or(RepoError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_title(&self, id: i64, title: TitleWrite) -> Result<Option<Title>, RepoError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"UPDATE titles
               SET name = COALESCE($2, name),
                   year = COALESCE($3, year),
                   description = COALESCE($4, description),
                   category_id = COALESCE($5, category_id)
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(title.name)
        .bind(title.year)
        .bind(title.description)
        .bind(title.category_id)
        .execute(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(genre_ids) = title.genre_ids {
            sqlx::query("DELETE FROM genre_title WHERE title_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO genre_title (title_id, genre_id) SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(&genre_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(self.load_title(id).await?)
    }

    /// delete_title
    ///
    /// Reviews, their comments and the genre links go with it (`ON DELETE CASCADE`).
    async fn delete_title(&self, id: i64) -> Result<bool, RepoError> {
        self.delete_by_id("titles", id).await
    }

    // --- REVIEWS ---

    async fn list_reviews(&self, title_id: i64, limit: i64, offset: i64) -> (Vec<Review>, i64) {
        let mut rows = QueryBuilder::new(REVIEW_SELECT);
        rows.push(" WHERE r.title_id = ");
        rows.push_bind(title_id);
        rows.push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ");
        rows.push_bind(limit);
        rows.push(" OFFSET ");
        rows.push_bind(offset);

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM reviews WHERE title_id = ");
        count.push_bind(title_id);

        self.fetch_page("list_reviews", rows, count).await
    }

    async fn get_review(&self, title_id: i64, review_id: i64) -> Option<Review> {
        sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT} WHERE r.id = $1 AND r.title_id = $2"
        ))
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_review error: {:?}", e);
            None
        })
    }

    /// create_review
    ///
    /// Inserts and joins the author's username in one statement. The
    /// `unique_review` constraint enforces one review per (title, author).
    async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        text: String,
        score: i16,
    ) -> Result<Review, RepoError> {
        sqlx::query_as::<_, Review>(
            r#"
            WITH inserted AS (
                INSERT INTO reviews (title_id, author_id, text, score)
                VALUES ($1, $2, $3, $4)
                RETURNING id, title_id, author_id, text, score, pub_date
            )
            SELECT i.id, i.title_id, i.author_id, i.text, u.username AS author, i.score, i.pub_date
            FROM inserted i JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(title_id)
        .bind(author_id)
        .bind(text)
        .bind(score)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn update_review(
        &self,
        review_id: i64,
        text: Option<String>,
        score: Option<i16>,
    ) -> Result<Option<Review>, RepoError> {
        let res = sqlx::query(
            "UPDATE reviews SET text = COALESCE($2, text), score = COALESCE($3, score) WHERE id = $1",
        )
        .bind(review_id)
        .bind(text)
        .bind(score)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }
        self.load_review(review_id).await.map_err(RepoError::from_sqlx)
    }

    async fn delete_review(&self, review_id: i64) -> Result<bool, RepoError> {
        self.delete_by_id("reviews", review_id).await
    }

    // --- COMMENTS ---

    async fn list_comments(
        &self,
        review_id: i64,
        limit: i64,
        offset: i64,
    ) -> (Vec<Comment>, i64) {
        let mut rows = QueryBuilder::new(COMMENT_SELECT);
        rows.push(" WHERE c.review_id = ");
        rows.push_bind(review_id);
        rows.push(" ORDER BY c.pub_date DESC, c.id DESC LIMIT ");
        rows.push_bind(limit);
        rows.push(" OFFSET ");
        rows.push_bind(offset);

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM comments WHERE review_id = ");
        count.push_bind(review_id);

        self.fetch_page("list_comments", rows, count).await
    }

    async fn get_comment(&self, review_id: i64, comment_id: i64) -> Option<Comment> {
        sqlx::query_as::<_, Comment>(&format!(
            "{COMMENT_SELECT} WHERE c.id = $1 AND c.review_id = $2"
        ))
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_comment error: {:?}", e);
            None
        })
    }

    async fn create_comment(
        &self,
        review_id: i64,
        author_id: i64,
        text: String,
    ) -> Result<Comment, RepoError> {
        sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (review_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING id, review_id, author_id, text, pub_date
            )
            SELECT i.id, i.review_id, i.author_id, i.text, u.username AS author, i.pub_date
            FROM inserted i JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(review_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn update_comment(
        &self,
        comment_id: i64,
        text: Option<String>,
    ) -> Result<Option<Comment>, RepoError> {
        let res = sqlx::query("UPDATE comments SET text = COALESCE($2, text) WHERE id = $1")
            .bind(comment_id)
            .bind(text)
            .execute(&self.pool)
            .await
            .map_err(RepoError::from_sqlx)?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }
        self.load_comment(comment_id).await.map_err(RepoError::from_sqlx)
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<bool, RepoError> {
        self.delete_by_id("comments", comment_id).await
    }
}
