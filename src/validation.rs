use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;

use crate::{
    error::{ApiError, FieldErrors},
    models::{
        CommentRequest, NewUser, ReviewRequest, Role, SignupRequest, SlugRequest, TitleRequest,
        UserPatch, UserRequest,
    },
};

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PERSON_NAME_MAX_LENGTH: usize = 150;
pub const BIO_MAX_LENGTH: usize = 2000;
pub const NAME_MAX_LENGTH: usize = 256;
pub const SLUG_MAX_LENGTH: usize = 50;
pub const SCORE_MIN: i32 = 1;
pub const SCORE_MAX: i32 = 10;

/// Reserved because `/users/me/` addresses the requester.
pub const RESERVED_USERNAME: &str = "me";

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

const REQUIRED: &str = "This field is required.";

/// Collects field errors and turns them into a single 400 at the end.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }

    fn max_length(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(
                field,
                format!("Ensure this field has no more than {max} characters."),
            );
        }
    }

    fn required_text(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, REQUIRED);
        }
    }

    pub fn username(&mut self, value: &str) {
        if value.is_empty() {
            self.add("username", REQUIRED);
            return;
        }
        self.max_length("username", value, USERNAME_MAX_LENGTH);
        if !USERNAME_RE.is_match(value) {
            self.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
        if value.eq_ignore_ascii_case(RESERVED_USERNAME) {
            self.add("username", "The username 'me' is reserved.");
        }
    }

    pub fn email(&mut self, value: &str) {
        if value.is_empty() {
            self.add("email", REQUIRED);
            return;
        }
        self.max_length("email", value, EMAIL_MAX_LENGTH);
        if !EMAIL_RE.is_match(value) {
            self.add("email", "Enter a valid email address.");
        }
    }

    pub fn slug(&mut self, value: &str) {
        if value.is_empty() {
            self.add("slug", REQUIRED);
            return;
        }
        self.max_length("slug", value, SLUG_MAX_LENGTH);
        if !SLUG_RE.is_match(value) {
            self.add(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            );
        }
    }

    fn role(&mut self, value: &str) -> Option<Role> {
        let role = Role::parse(value);
        if role.is_none() {
            self.add("role", format!("\"{value}\" is not a valid choice."));
        }
        role
    }
}

/// Latest year a title may carry.
pub fn current_year() -> i32 {
    Utc::now().year()
}

pub fn validate_signup(req: &SignupRequest) -> Result<(), ApiError> {
    let mut v = Validator::new();
    v.username(&req.username);
    v.email(&req.email);
    v.finish()
}

pub fn validate_slug_request(req: &SlugRequest) -> Result<(), ApiError> {
    let mut v = Validator::new();
    v.required_text("name", &req.name);
    v.max_length("name", &req.name, NAME_MAX_LENGTH);
    v.slug(&req.slug);
    v.finish()
}

/// Checks the scalar title fields and returns the year narrowed to the column type.
/// Slug references are resolved separately against the repository.
pub fn validate_title(req: &TitleRequest, partial: bool) -> Result<Option<i16>, ApiError> {
    let mut v = Validator::new();

    match &req.name {
        Some(name) => {
            v.required_text("name", name);
            v.max_length("name", name, NAME_MAX_LENGTH);
        }
        None if !partial => v.add("name", REQUIRED),
        None => {}
    }

    let mut year = None;
    match req.year {
        Some(y) if y > current_year() => {
            v.add("year", format!("Year cannot be later than {}.", current_year()));
        }
        Some(y) => match i16::try_from(y) {
            Ok(y) => year = Some(y),
            Err(_) => v.add("year", "Enter a valid year."),
        },
        None if !partial => v.add("year", REQUIRED),
        None => {}
    }

    match &req.genre {
        Some(slugs) if slugs.is_empty() => v.add("genre", "This list may not be empty."),
        Some(_) => {}
        None if !partial => v.add("genre", REQUIRED),
        None => {}
    }

    if req.category.is_none() && !partial {
        v.add("category", REQUIRED);
    }

    v.finish().map(|_| year)
}

/// Returns the validated `(text, score)` pair; both are `None` only on an empty PATCH.
pub fn validate_review(
    req: &ReviewRequest,
    partial: bool,
) -> Result<(Option<String>, Option<i16>), ApiError> {
    let mut v = Validator::new();

    match &req.text {
        Some(text) => v.required_text("text", text),
        None if !partial => v.add("text", REQUIRED),
        None => {}
    }

    let mut score = None;
    match req.score {
        Some(s) if (SCORE_MIN..=SCORE_MAX).contains(&s) => score = i16::try_from(s).ok(),
        Some(_) => v.add(
            "score",
            format!("Score must be between {SCORE_MIN} and {SCORE_MAX}."),
        ),
        None if !partial => v.add("score", REQUIRED),
        None => {}
    }

    v.finish().map(|_| (req.text.clone(), score))
}

pub fn validate_comment(req: &CommentRequest, partial: bool) -> Result<Option<String>, ApiError> {
    let mut v = Validator::new();
    match &req.text {
        Some(text) => v.required_text("text", text),
        None if !partial => v.add("text", REQUIRED),
        None => {}
    }
    v.finish().map(|_| req.text.clone())
}

/// Validates a full account payload for `POST /users/`.
pub fn validate_new_user(req: &UserRequest) -> Result<NewUser, ApiError> {
    let mut v = Validator::new();

    let username = req.username.clone().unwrap_or_default();
    let email = req.email.clone().unwrap_or_default();
    v.username(&username);
    v.email(&email);

    let first_name = req.first_name.clone().unwrap_or_default();
    let last_name = req.last_name.clone().unwrap_or_default();
    v.max_length("first_name", &first_name, PERSON_NAME_MAX_LENGTH);
    v.max_length("last_name", &last_name, PERSON_NAME_MAX_LENGTH);
    if let Some(bio) = &req.bio {
        v.max_length("bio", bio, BIO_MAX_LENGTH);
    }

    let role = match &req.role {
        Some(r) => v.role(r).unwrap_or_default(),
        None => Role::User,
    };

    v.finish()?;
    Ok(NewUser {
        username,
        email,
        first_name,
        last_name,
        bio: req.bio.clone(),
        role,
        is_superuser: false,
    })
}

/// Validates a partial account update. `allow_role` is false on `/users/me/`,
/// where any submitted role is dropped.
pub fn validate_user_patch(req: &UserRequest, allow_role: bool) -> Result<UserPatch, ApiError> {
    let mut v = Validator::new();

    if let Some(username) = &req.username {
        v.username(username);
    }
    if let Some(email) = &req.email {
        v.email(email);
    }
    if let Some(first_name) = &req.first_name {
        v.max_length("first_name", first_name, PERSON_NAME_MAX_LENGTH);
    }
    if let Some(last_name) = &req.last_name {
        v.max_length("last_name", last_name, PERSON_NAME_MAX_LENGTH);
    }
    if let Some(bio) = &req.bio {
        v.max_length("bio", bio, BIO_MAX_LENGTH);
    }

    let role = match (&req.role, allow_role) {
        (Some(r), true) => v.role(r),
        _ => None,
    };

    v.finish()?;
    Ok(UserPatch {
        username: req.username.clone(),
        email: req.email.clone(),
        first_name: req.first_name.clone(),
        last_name: req.last_name.clone(),
        bio: req.bio.clone(),
        role,
    })
}
