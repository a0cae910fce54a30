//! Body extraction that fails inside the response envelope.
//!
//! `axum::Json` rejects malformed bodies with a plain-text response; this
//! wrapper keeps the `{error, meta}` contract for those failures too.

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::Response;

use super::envelope::ApiErrorResponse;

/// Drop-in replacement for `axum::Json` as an extractor. Deserialization
/// failures come back as enveloped `400 INVALID_ARGUMENT` responses.
pub struct Json<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Json<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiErrorResponse::build(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                rejection.body_text(),
            )),
        }
    }
}
