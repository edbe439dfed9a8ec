use chrono::Utc;
use serde_json::json;
use yamdb_api::{
    ApiError,
    models::{
        Category, Comment, Genre, ReviewRequest, Role, SignupRequest, SlugRequest, Title,
        TitleRequest, User, UserRequest,
    },
    pagination::PageRequest,
    validation::{
        BIO_MAX_LENGTH, current_year, validate_comment, validate_new_user, validate_review,
        validate_signup, validate_slug_request, validate_title, validate_user_patch,
    },
};

fn error_fields(err: ApiError) -> Vec<String> {
    match err {
        ApiError::Validation(errors) => errors.into_keys().collect(),
        other => panic!("expected validation error, got {other:?}"),
    }
}

// --- Serialization shapes ---

#[test]
fn test_user_hides_internal_fields() {
    let user = User {
        id: 42,
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        role: Role::Moderator,
        is_superuser: true,
        ..User::default()
    };
    let value = serde_json::to_value(&user).unwrap();
    assert_eq!(value["role"], "moderator");
    assert!(value.get("id").is_none());
    assert!(value.get("is_superuser").is_none());
    assert_eq!(value["bio"], serde_json::Value::Null);
}

#[test]
fn test_title_serializes_nested_taxonomy() {
    let title = Title {
        id: 1,
        name: "Heat".to_string(),
        year: 1995,
        rating: None,
        description: String::new(),
        genre: vec![Genre {
            id: 9,
            name: "Crime".to_string(),
            slug: "crime".to_string(),
        }],
        category: Some(Category {
            id: 3,
            name: "Films".to_string(),
            slug: "films".to_string(),
        }),
    };
    let value = serde_json::to_value(&title).unwrap();
    assert_eq!(
        value,
        json!({
            "id": 1,
            "name": "Heat",
            "year": 1995,
            "rating": null,
            "description": "",
            "genre": [{ "name": "Crime", "slug": "crime" }],
            "category": { "name": "Films", "slug": "films" }
        })
    );
}

#[test]
fn test_comment_exposes_author_name_only() {
    let comment = Comment {
        id: 5,
        review_id: 2,
        author_id: 7,
        text: "Agreed".to_string(),
        author: "fan".to_string(),
        pub_date: Utc::now(),
    };
    let value = serde_json::to_value(&comment).unwrap();
    assert_eq!(value["author"], "fan");
    assert!(value.get("author_id").is_none());
    assert!(value.get("review_id").is_none());
    assert!(value["pub_date"].is_string());
}

#[test]
fn test_request_payloads_tolerate_missing_fields() {
    let signup: SignupRequest = serde_json::from_value(json!({})).unwrap();
    assert!(signup.username.is_empty());

    let title: TitleRequest = serde_json::from_value(json!({ "year": 2000 })).unwrap();
    assert_eq!(title.year, Some(2000));
    assert!(title.genre.is_none());
}

#[test]
fn test_role_parsing() {
    assert_eq!(Role::parse("admin"), Some(Role::Admin));
    assert_eq!(Role::parse("Admin"), None);
    assert_eq!(Role::default(), Role::User);
    assert_eq!(Role::try_from("moderator".to_string()), Ok(Role::Moderator));
    assert!(Role::try_from("root".to_string()).is_err());
}

// --- Validation ---

#[test]
fn test_signup_validation() {
    let ok = SignupRequest {
        username: "user.name+tag@x".to_string(),
        email: "a@b.co".to_string(),
    };
    assert!(validate_signup(&ok).is_ok());

    let bad = SignupRequest {
        username: "has space".to_string(),
        email: "not-an-email".to_string(),
    };
    assert_eq!(error_fields(validate_signup(&bad).unwrap_err()), vec!["email", "username"]);

    let long = SignupRequest {
        username: "u".repeat(151),
        email: "a@b.co".to_string(),
    };
    assert_eq!(error_fields(validate_signup(&long).unwrap_err()), vec!["username"]);
}

#[test]
fn test_slug_validation() {
    let ok = SlugRequest {
        name: "Science fiction".to_string(),
        slug: "sci-fi_2".to_string(),
    };
    assert!(validate_slug_request(&ok).is_ok());

    let bad = SlugRequest {
        name: "".to_string(),
        slug: "bad slug!".to_string(),
    };
    assert_eq!(
        error_fields(validate_slug_request(&bad).unwrap_err()),
        vec!["name", "slug"]
    );

    let long = SlugRequest {
        name: "ok".to_string(),
        slug: "s".repeat(51),
    };
    assert_eq!(error_fields(validate_slug_request(&long).unwrap_err()), vec!["slug"]);
}

#[test]
fn test_title_validation() {
    let full = TitleRequest {
        name: Some("Heat".to_string()),
        year: Some(current_year()),
        description: None,
        genre: Some(vec!["crime".to_string()]),
        category: Some("films".to_string()),
    };
    assert!(validate_title(&full, false).is_ok());

    let future = TitleRequest {
        year: Some(current_year() + 1),
        ..full.clone()
    };
    assert_eq!(error_fields(validate_title(&future, false).unwrap_err()), vec!["year"]);

    let empty_genres = TitleRequest {
        genre: Some(vec![]),
        ..full.clone()
    };
    assert_eq!(
        error_fields(validate_title(&empty_genres, false).unwrap_err()),
        vec!["genre"]
    );

    // Partial updates accept an empty payload.
    assert_eq!(validate_title(&TitleRequest::default(), true).unwrap(), None);
}

#[test]
fn test_review_validation() {
    let ok = ReviewRequest {
        text: Some("Fine".to_string()),
        score: Some(10),
    };
    assert_eq!(
        validate_review(&ok, false).unwrap(),
        (Some("Fine".to_string()), Some(10))
    );

    let missing = ReviewRequest::default();
    assert_eq!(
        error_fields(validate_review(&missing, false).unwrap_err()),
        vec!["score", "text"]
    );
    assert_eq!(validate_review(&missing, true).unwrap(), (None, None));

    let blank = ReviewRequest {
        text: Some("  ".to_string()),
        score: Some(1),
    };
    assert_eq!(error_fields(validate_review(&blank, true).unwrap_err()), vec!["text"]);
}

#[test]
fn test_comment_validation() {
    let req = yamdb_api::models::CommentRequest { text: None };
    assert!(validate_comment(&req, false).is_err());
    assert_eq!(validate_comment(&req, true).unwrap(), None);
}

#[test]
fn test_user_validation() {
    let req = UserRequest {
        username: Some("newbie".to_string()),
        email: Some("newbie@example.com".to_string()),
        first_name: Some("N".repeat(151)),
        ..UserRequest::default()
    };
    assert_eq!(error_fields(validate_new_user(&req).unwrap_err()), vec!["first_name"]);

    let ok = UserRequest {
        first_name: None,
        ..req.clone()
    };
    let new_user = validate_new_user(&ok).unwrap();
    assert_eq!(new_user.role, Role::User);
    assert!(!new_user.is_superuser);

    let with_role = UserRequest {
        role: Some("admin".to_string()),
        ..UserRequest::default()
    };
    assert_eq!(validate_user_patch(&with_role, true).unwrap().role, Some(Role::Admin));
    assert_eq!(validate_user_patch(&with_role, false).unwrap().role, None);

    let long_bio = UserRequest {
        bio: Some("b".repeat(BIO_MAX_LENGTH + 1)),
        ..UserRequest::default()
    };
    assert_eq!(
        error_fields(validate_user_patch(&long_bio, false).unwrap_err()),
        vec!["bio"]
    );
    let full_bio = UserRequest {
        bio: Some("b".repeat(BIO_MAX_LENGTH)),
        ..ok.clone()
    };
    assert!(validate_new_user(&full_bio).is_ok());
    let too_long = UserRequest {
        bio: long_bio.bio.clone(),
        ..ok
    };
    assert_eq!(error_fields(validate_new_user(&too_long).unwrap_err()), vec!["bio"]);
}

// --- Pagination ---

#[test]
fn test_page_request_bounds() {
    assert!(matches!(PageRequest::new(Some(0), 10), Err(ApiError::NotFound(_))));

    let first = PageRequest::new(None, 10).unwrap();
    assert_eq!(first.number, 1);
    assert_eq!((first.limit(), first.offset()), (10, 0));

    let third = PageRequest::new(Some(3), 10).unwrap();
    assert_eq!(third.offset(), 20);
}

#[test]
fn test_page_links() {
    let page = PageRequest::new(Some(2), 10)
        .unwrap()
        .into_page(vec![1, 2, 3], 23)
        .unwrap();
    assert_eq!(page.count, 23);
    assert_eq!(page.next.as_deref(), Some("?page=3"));
    assert_eq!(page.previous.as_deref(), Some("?page=1"));

    let last = PageRequest::new(Some(3), 10)
        .unwrap()
        .into_page(vec![1, 2, 3], 23)
        .unwrap();
    assert!(last.next.is_none());
}

#[test]
fn test_empty_first_page_is_valid_but_later_pages_are_not() {
    let empty = PageRequest::new(None, 10)
        .unwrap()
        .into_page(Vec::<i32>::new(), 0)
        .unwrap();
    assert_eq!(empty.count, 0);
    assert!(empty.next.is_none() && empty.previous.is_none());

    let beyond = PageRequest::new(Some(2), 10)
        .unwrap()
        .into_page(Vec::<i32>::new(), 10);
    assert!(matches!(beyond, Err(ApiError::NotFound(_))));
}
