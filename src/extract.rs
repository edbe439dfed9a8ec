use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// JsonBody
///
/// Request body extractor. Behaves like `Json` but rejects with `ApiError`, so a
/// body that is not JSON or carries a wrongly typed field is a 400 in the same
/// `{field: [messages]}` shape as any other validation failure.
#[derive(Debug, Clone, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match &rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Expected a request with `Content-Type: application/json`.".to_string()
            }
            other => other.body_text(),
        };
        tracing::debug!(%message, "rejected request body");
        ApiError::field("non_field_errors", message)
    }
}
