use crate::{
    AppState,
    auth::{generate_confirmation_code, issue_token},
    error::ApiError,
    extract::JsonBody,
    models::{NewUser, Role, SignupRequest, TokenRequest, TokenResponse, User},
    validation::{Validator, validate_signup},
};
use axum::{Json, extract::State};

/// signup
///
/// [Public Route] Registers an account (or re-uses the exact username/email pair)
/// and mails a fresh confirmation code. Repeating the call re-issues the code.
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup/",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Confirmation code sent", body = SignupRequest),
        (status = 400, description = "Invalid or already taken username/email")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SignupRequest>,
) -> Result<Json<SignupRequest>, ApiError> {
    validate_signup(&payload)?;

    let user = resolve_signup_account(&state, &payload).await?;

    let code = generate_confirmation_code();
    if !state.repo.set_confirmation_code(user.id, &code).await? {
        return Err(ApiError::Internal(format!(
            "could not store confirmation code for user {}",
            user.id
        )));
    }

    state
        .mailer
        .send_confirmation_code(&user.email, &code)
        .await
        .map_err(|e| ApiError::Internal(format!("confirmation mail failed: {e}")))?;

    tracing::info!(username = %user.username, "confirmation code issued");

    Ok(Json(SignupRequest {
        username: user.username,
        email: user.email,
    }))
}

/// Finds the account matching both username and email, or creates it when
/// neither is in use. A half match is a validation error.
async fn resolve_signup_account(
    state: &AppState,
    payload: &SignupRequest,
) -> Result<User, ApiError> {
    let by_username = state.repo.get_user_by_username(&payload.username).await;
    let by_email = state.repo.get_user_by_email(&payload.email).await;

    match (by_username, by_email) {
        (Some(user), _) if user.email == payload.email => Ok(user),
        (Some(_), _) => Err(ApiError::field(
            "username",
            "A user with that username already exists.",
        )),
        (None, Some(_)) => Err(ApiError::field(
            "email",
            "A user with that email already exists.",
        )),
        (None, None) => {
            let new_user = NewUser {
                username: payload.username.clone(),
                email: payload.email.clone(),
                role: Role::User,
                ..NewUser::default()
            };
            state
                .repo
                .create_user(new_user)
                .await
                .map_err(super::users::user_conflict)
        }
    }
}

/// obtain_token
///
/// [Public Route] Exchanges `username` + `confirmation_code` for an access token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/token/",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Access token", body = TokenResponse),
        (status = 400, description = "Missing fields or wrong confirmation code"),
        (status = 404, description = "Unknown username")
    )
)]
pub async fn obtain_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut v = Validator::new();
    if payload.username.is_empty() {
        v.add("username", "This field is required.");
    }
    if payload.confirmation_code.is_empty() {
        v.add("confirmation_code", "This field is required.");
    }
    v.finish()?;

    let user = state
        .repo
        .get_user_by_username(&payload.username)
        .await
        .ok_or_else(ApiError::not_found)?;

    let stored = state.repo.get_confirmation_code(user.id).await;
    if stored.as_deref() != Some(payload.confirmation_code.as_str()) {
        return Err(ApiError::field(
            "confirmation_code",
            "Invalid confirmation code.",
        ));
    }

    let token = issue_token(user.id, &state.config.jwt_secret, state.config.jwt_ttl_hours)?;
    Ok(Json(TokenResponse { token }))
}
