use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::{Role, User},
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` in place of a bearer token.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the access token issued by `POST /auth/token/`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the `users.id` of the token holder.
    pub sub: i64,
    /// Expiration time (seconds since epoch).
    pub exp: usize,
    /// Issued at (seconds since epoch).
    pub iat: usize,
}

/// Signs an HS256 access token for `user_id` valid for `ttl_hours`.
pub fn issue_token(user_id: i64, secret: &str, ttl_hours: i64) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp().max(0) as usize,
        exp: (now + Duration::hours(ttl_hours)).timestamp().max(0) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
}

/// Validates signature and expiry and returns the claims.
pub fn verify_token(token: &str, secret: &str) -> Option<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .ok()
}

/// A fresh single-account confirmation code: 32 hex characters of randomness.
pub fn generate_confirmation_code() -> String {
    Uuid::new_v4().simple().to_string()
}

/// AuthUser
///
/// The resolved identity of an authenticated request, plus the role checks the
/// handlers build their permission rules from.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub is_superuser: bool,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            is_superuser: user.is_superuser,
        }
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin || self.is_superuser
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }

    /// Reviews and comments may be changed by their author, moderators and admins.
    pub fn can_modify(&self, author_id: i64) -> bool {
        self.id == author_id || self.is_moderator() || self.is_admin()
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    pub fn require_author_or_staff(&self, author_id: i64) -> Result<(), ApiError> {
        if self.can_modify(author_id) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. An identity already resolved by the router's auth layer is reused as is.
/// 2. In `Env::Local`, an `x-user-id` header naming an existing user authenticates directly.
/// 3. Otherwise a `Bearer` token is required, validated and resolved to a live user.
///
/// Rejection: `ApiError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let dev_id = parts
                .headers
                .get(DEV_USER_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.parse::<i64>().ok());
            if let Some(user_id) = dev_id {
                if let Some(user) = repo.get_user(user_id).await {
                    return Ok(user.into());
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let claims = verify_token(token, &config.jwt_secret).ok_or(ApiError::Unauthorized)?;

        // A valid token for a deleted account is still rejected.
        let user = repo
            .get_user(claims.sub)
            .await
            .ok_or(ApiError::Unauthorized)?;

        Ok(user.into())
    }
}
