#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use yamdb_api::{
    AppState, MockMailer, RepoError,
    config::{AppConfig, Env},
    models::{
        Category, Comment, Genre, NewUser, Review, Role, SlugRequest, Title, TitleFilter,
        TitleWrite, User, UserPatch,
    },
    repository::{Repository, RepositoryState},
};

// --- In-memory Repository ---

struct TitleRecord {
    id: i64,
    name: String,
    year: i16,
    description: String,
    category_id: Option<i64>,
    genre_ids: Vec<i64>,
}

#[derive(Default)]
struct Store {
    last_id: i64,
    users: Vec<User>,
    codes: HashMap<i64, String>,
    categories: Vec<Category>,
    genres: Vec<Genre>,
    titles: Vec<TitleRecord>,
    reviews: Vec<Review>,
    comments: Vec<Comment>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn username_of(&self, user_id: i64) -> String {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn build_title(&self, record: &TitleRecord) -> Title {
        let scores: Vec<f64> = self
            .reviews
            .iter()
            .filter(|r| r.title_id == record.id)
            .map(|r| f64::from(r.score))
            .collect();
        let rating = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        let mut genre: Vec<Genre> = self
            .genres
            .iter()
            .filter(|g| record.genre_ids.contains(&g.id))
            .cloned()
            .collect();
        genre.sort_by(|a, b| a.name.cmp(&b.name));

        Title {
            id: record.id,
            name: record.name.clone(),
            year: record.year,
            rating,
            description: record.description.clone(),
            genre,
            category: record
                .category_id
                .and_then(|id| self.categories.iter().find(|c| c.id == id).cloned()),
        }
    }

    fn title(&self, id: i64) -> Option<Title> {
        self.titles
            .iter()
            .find(|t| t.id == id)
            .map(|t| self.build_title(t))
    }

    fn remove_reviews_where(&mut self, keep: impl Fn(&Review) -> bool) {
        let removed: Vec<i64> = self
            .reviews
            .iter()
            .filter(|r| !keep(r))
            .map(|r| r.id)
            .collect();
        self.reviews.retain(|r| keep(r));
        self.comments.retain(|c| !removed.contains(&c.review_id));
    }
}

fn page<T: Clone>(items: Vec<T>, limit: i64, offset: i64) -> (Vec<T>, i64) {
    let count = items.len() as i64;
    let results = items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect();
    (results, count)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// InMemoryRepository
///
/// A `Repository` over plain vectors with the same ordering, uniqueness and
/// cascade rules as the Postgres schema, so handler and router tests run
/// without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
    // When set, updates and deletes fail like a lost database connection.
    should_fail: AtomicBool,
    user_lookups: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get_user` calls so far.
    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self) {
        self.should_fail.store(true, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), RepoError> {
        if self.should_fail.load(Ordering::SeqCst) {
            Err(RepoError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    /// Seeds an account directly, bypassing validation.
    pub fn seed_user(&self, username: &str, role: Role) -> User {
        let mut store = self.lock();
        let user = User {
            id: store.next_id(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            role,
            ..User::default()
        };
        store.users.push(user.clone());
        user
    }

    pub fn seed_superuser(&self, username: &str) -> User {
        let mut store = self.lock();
        let user = User {
            id: store.next_id(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            role: Role::User,
            is_superuser: true,
            ..User::default()
        };
        store.users.push(user.clone());
        user
    }

    pub fn seed_category(&self, name: &str, slug: &str) -> Category {
        let mut store = self.lock();
        let category = Category {
            id: store.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        store.categories.push(category.clone());
        category
    }

    pub fn seed_genre(&self, name: &str, slug: &str) -> Genre {
        let mut store = self.lock();
        let genre = Genre {
            id: store.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        store.genres.push(genre.clone());
        genre
    }

    pub fn seed_title(
        &self,
        name: &str,
        year: i16,
        category: Option<&Category>,
        genres: &[&Genre],
    ) -> Title {
        let mut store = self.lock();
        let record = TitleRecord {
            id: store.next_id(),
            name: name.to_string(),
            year,
            description: String::new(),
            category_id: category.map(|c| c.id),
            genre_ids: genres.iter().map(|g| g.id).collect(),
        };
        let title = store.build_title(&record);
        store.titles.push(record);
        title
    }

    pub fn seed_review(&self, title_id: i64, author: &User, score: i16) -> Review {
        let mut store = self.lock();
        let review = Review {
            id: store.next_id(),
            title_id,
            author_id: author.id,
            text: format!("review by {}", author.username),
            author: author.username.clone(),
            score,
            pub_date: Utc::now(),
        };
        store.reviews.push(review.clone());
        review
    }

    pub fn seed_comment(&self, review_id: i64, author: &User) -> Comment {
        let mut store = self.lock();
        let comment = Comment {
            id: store.next_id(),
            review_id,
            author_id: author.id,
            text: format!("comment by {}", author.username),
            author: author.username.clone(),
            pub_date: Utc::now(),
        };
        store.comments.push(comment.clone());
        comment
    }

    pub fn review_count(&self) -> usize {
        self.lock().reviews.len()
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- Users ---

    async fn get_user(&self, id: i64) -> Option<User> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        self.lock().users.iter().find(|u| u.id == id).cloned()
    }

    async fn get_user_by_username(&self, username: &str) -> Option<User> {
        self.lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
    }

    async fn get_user_by_email(&self, email: &str) -> Option<User> {
        self.lock().users.iter().find(|u| u.email == email).cloned()
    }

    async fn list_users(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> (Vec<User>, i64) {
        let mut users: Vec<User> = self
            .lock()
            .users
            .iter()
            .filter(|u| search.as_deref().is_none_or(|s| contains_ci(&u.username, s)))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        page(users, limit, offset)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let mut store = self.lock();
        if store.users.iter().any(|u| u.username == user.username) {
            return Err(RepoError::Conflict("users_username_key".to_string()));
        }
        if store.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Conflict("users_email_key".to_string()));
        }
        let created = User {
            id: store.next_id(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
            is_superuser: user.is_superuser,
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<Option<User>, RepoError> {
        let mut store = self.lock();
        if let Some(username) = &patch.username {
            if store.users.iter().any(|u| u.id != id && &u.username == username) {
                return Err(RepoError::Conflict("users_username_key".to_string()));
            }
        }
        if let Some(email) = &patch.email {
            if store.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(RepoError::Conflict("users_email_key".to_string()));
            }
        }
        let Some(user) = store.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = patch.username {
            user.username = v;
        }
        if let Some(v) = patch.email {
            user.email = v;
        }
        if let Some(v) = patch.first_name {
            user.first_name = v;
        }
        if let Some(v) = patch.last_name {
            user.last_name = v;
        }
        if patch.bio.is_some() {
            user.bio = patch.bio;
        }
        if let Some(v) = patch.role {
            user.role = v;
        }
        let updated = user.clone();

        // Denormalized author names follow the rename.
        for review in store.reviews.iter_mut().filter(|r| r.author_id == id) {
            review.author = updated.username.clone();
        }
        for comment in store.comments.iter_mut().filter(|c| c.author_id == id) {
            comment.author = updated.username.clone();
        }
        Ok(Some(updated))
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepoError> {
        self.check_write()?;
        let mut store = self.lock();
        let before = store.users.len();
        store.users.retain(|u| u.id != id);
        if store.users.len() == before {
            return Ok(false);
        }
        store.codes.remove(&id);
        store.comments.retain(|c| c.author_id != id);
        store.remove_reviews_where(|r| r.author_id != id);
        Ok(true)
    }

    async fn set_confirmation_code(&self, id: i64, code: &str) -> Result<bool, RepoError> {
        self.check_write()?;
        let mut store = self.lock();
        if store.users.iter().any(|u| u.id == id) {
            store.codes.insert(id, code.to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn get_confirmation_code(&self, id: i64) -> Option<String> {
        self.lock().codes.get(&id).cloned()
    }

    // --- Categories & Genres ---

    async fn list_categories(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> (Vec<Category>, i64) {
        let mut items: Vec<Category> = self
            .lock()
            .categories
            .iter()
            .filter(|c| search.as_deref().is_none_or(|s| contains_ci(&c.name, s)))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        page(items, limit, offset)
    }

    async fn get_category_by_slug(&self, slug: &str) -> Option<Category> {
        self.lock()
            .categories
            .iter()
            .find(|c| c.slug == slug)
            .cloned()
    }

    async fn create_category(&self, req: SlugRequest) -> Result<Category, RepoError> {
        let mut store = self.lock();
        if store.categories.iter().any(|c| c.slug == req.slug) {
            return Err(RepoError::Conflict("categories_slug_key".to_string()));
        }
        let category = Category {
            id: store.next_id(),
            name: req.name,
            slug: req.slug,
        };
        store.categories.push(category.clone());
        Ok(category)
    }

    async fn delete_category(&self, slug: &str) -> Result<bool, RepoError> {
        self.check_write()?;
        let mut store = self.lock();
        let Some(id) = store.categories.iter().find(|c| c.slug == slug).map(|c| c.id) else {
            return Ok(false);
        };
        store.categories.retain(|c| c.id != id);
        for title in store.titles.iter_mut().filter(|t| t.category_id == Some(id)) {
            title.category_id = None;
        }
        Ok(true)
    }

    async fn list_genres(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> (Vec<Genre>, i64) {
        let mut items: Vec<Genre> = self
            .lock()
            .genres
            .iter()
            .filter(|g| search.as_deref().is_none_or(|s| contains_ci(&g.name, s)))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        page(items, limit, offset)
    }

    async fn get_genres_by_slugs(&self, slugs: &[String]) -> Vec<Genre> {
        self.lock()
            .genres
            .iter()
            .filter(|g| slugs.contains(&g.slug))
            .cloned()
            .collect()
    }

    async fn create_genre(&self, req: SlugRequest) -> Result<Genre, RepoError> {
        let mut store = self.lock();
        if store.genres.iter().any(|g| g.slug == req.slug) {
            return Err(RepoError::Conflict("genres_slug_key".to_string()));
        }
        let genre = Genre {
            id: store.next_id(),
            name: req.name,
            slug: req.slug,
        };
        store.genres.push(genre.clone());
        Ok(genre)
    }

    async fn delete_genre(&self, slug: &str) -> Result<bool, RepoError> {
        self.check_write()?;
        let mut store = self.lock();
        let Some(id) = store.genres.iter().find(|g| g.slug == slug).map(|g| g.id) else {
            return Ok(false);
        };
        store.genres.retain(|g| g.id != id);
        for title in store.titles.iter_mut() {
            title.genre_ids.retain(|g| *g != id);
        }
        Ok(true)
    }

    // --- Titles ---

    async fn list_titles(
        &self,
        filter: &TitleFilter,
        limit: i64,
        offset: i64,
    ) -> (Vec<Title>, i64) {
        let store = self.lock();
        let mut titles: Vec<Title> = store
            .titles
            .iter()
            .map(|t| store.build_title(t))
            .filter(|t| {
                filter
                    .genre
                    .as_deref()
                    .is_none_or(|slug| t.genre.iter().any(|g| g.slug == slug))
                    && filter
                        .category
                        .as_deref()
                        .is_none_or(|slug| t.category.as_ref().is_some_and(|c| c.slug == slug))
                    && filter
                        .name
                        .as_deref()
                        .is_none_or(|name| contains_ci(&t.name, name))
                    && filter.year.is_none_or(|year| i32::from(t.year) == year)
            })
            .collect();
        drop(store);

        titles.sort_by(|a, b| match (a.rating, b.rating) {
            (Some(x), Some(y)) => y.total_cmp(&x).then(a.id.cmp(&b.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.id.cmp(&b.id),
        });
        page(titles, limit, offset)
    }

    async fn get_title(&self, id: i64) -> Option<Title> {
        self.lock().title(id)
    }

    async fn create_title(&self, title: TitleWrite) -> Result<Title, RepoError> {
        let mut store = self.lock();
        let mut genre_ids = title.genre_ids.unwrap_or_default();
        genre_ids.dedup();
        let record = TitleRecord {
            id: store.next_id(),
            name: title.name.unwrap_or_default(),
            year: title.year.unwrap_or_default(),
            description: title.description.unwrap_or_default(),
            category_id: title.category_id,
            genre_ids,
        };
        let created = store.build_title(&record);
        store.titles.push(record);
        Ok(created)
    }

    async fn update_title(&self, id: i64, title: TitleWrite) -> Result<Option<Title>, RepoError> {
        let mut store = self.lock();
        let Some(record) = store.titles.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(v) = title.name {
            record.name = v;
        }
        if let Some(v) = title.year {
            record.year = v;
        }
        if let Some(v) = title.description {
            record.description = v;
        }
        if let Some(v) = title.category_id {
            record.category_id = Some(v);
        }
        if let Some(v) = title.genre_ids {
            record.genre_ids = v;
        }
        Ok(store.title(id))
    }

    async fn delete_title(&self, id: i64) -> Result<bool, RepoError> {
        self.check_write()?;
        let mut store = self.lock();
        let before = store.titles.len();
        store.titles.retain(|t| t.id != id);
        if store.titles.len() == before {
            return Ok(false);
        }
        store.remove_reviews_where(|r| r.title_id != id);
        Ok(true)
    }

    // --- Reviews ---

    async fn list_reviews(&self, title_id: i64, limit: i64, offset: i64) -> (Vec<Review>, i64) {
        let mut items: Vec<Review> = self
            .lock()
            .reviews
            .iter()
            .filter(|r| r.title_id == title_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        page(items, limit, offset)
    }

    async fn get_review(&self, title_id: i64, review_id: i64) -> Option<Review> {
        self.lock()
            .reviews
            .iter()
            .find(|r| r.id == review_id && r.title_id == title_id)
            .cloned()
    }

    async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        text: String,
        score: i16,
    ) -> Result<Review, RepoError> {
        let mut store = self.lock();
        if store
            .reviews
            .iter()
            .any(|r| r.title_id == title_id && r.author_id == author_id)
        {
            return Err(RepoError::Conflict("unique_review".to_string()));
        }
        let review = Review {
            id: store.next_id(),
            title_id,
            author_id,
            text,
            author: store.username_of(author_id),
            score,
            pub_date: Utc::now(),
        };
        store.reviews.push(review.clone());
        Ok(review)
    }

    async fn update_review(
        &self,
        review_id: i64,
        text: Option<String>,
        score: Option<i16>,
    ) -> Result<Option<Review>, RepoError> {
        self.check_write()?;
        let mut store = self.lock();
        let Some(review) = store.reviews.iter_mut().find(|r| r.id == review_id) else {
            return Ok(None);
        };
        if let Some(v) = text {
            review.text = v;
        }
        if let Some(v) = score {
            review.score = v;
        }
        Ok(Some(review.clone()))
    }

    async fn delete_review(&self, review_id: i64) -> Result<bool, RepoError> {
        self.check_write()?;
        let mut store = self.lock();
        let before = store.reviews.len();
        store.remove_reviews_where(|r| r.id != review_id);
        Ok(store.reviews.len() != before)
    }

    // --- Comments ---

    async fn list_comments(
        &self,
        review_id: i64,
        limit: i64,
        offset: i64,
    ) -> (Vec<Comment>, i64) {
        let mut items: Vec<Comment> = self
            .lock()
            .comments
            .iter()
            .filter(|c| c.review_id == review_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        page(items, limit, offset)
    }

    async fn get_comment(&self, review_id: i64, comment_id: i64) -> Option<Comment> {
        self.lock()
            .comments
            .iter()
            .find(|c| c.id == comment_id && c.review_id == review_id)
            .cloned()
    }

    async fn create_comment(
        &self,
        review_id: i64,
        author_id: i64,
        text: String,
    ) -> Result<Comment, RepoError> {
        let mut store = self.lock();
        let comment = Comment {
            id: store.next_id(),
            review_id,
            author_id,
            text,
            author: store.username_of(author_id),
            pub_date: Utc::now(),
        };
        store.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(
        &self,
        comment_id: i64,
        text: Option<String>,
    ) -> Result<Option<Comment>, RepoError> {
        self.check_write()?;
        let mut store = self.lock();
        let Some(comment) = store.comments.iter_mut().find(|c| c.id == comment_id) else {
            return Ok(None);
        };
        if let Some(v) = text {
            comment.text = v;
        }
        Ok(Some(comment.clone()))
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<bool, RepoError> {
        self.check_write()?;
        let mut store = self.lock();
        let before = store.comments.len();
        store.comments.retain(|c| c.id != comment_id);
        Ok(store.comments.len() != before)
    }
}

// --- State helpers ---

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

/// Production-mode config: bearer tokens only, no `x-user-id` bypass.
pub fn test_config() -> AppConfig {
    AppConfig {
        env: Env::Production,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

pub struct TestContext {
    pub repo: Arc<InMemoryRepository>,
    pub mailer: MockMailer,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let mailer = MockMailer::new();
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            mailer: Arc::new(mailer.clone()),
            config,
        };
        Self {
            repo,
            mailer,
            state,
        }
    }
}
