//! Custom axum extractors.

use super::error::ClientError;
use axum::{async_trait, extract::FromRequestParts};
use http::request::Parts;
use serde::de::DeserializeOwned;

/// A custom Query extractor since axum's does not let us customize the response.
///
/// Rejections are reported as a JSON [`ErrorBody`](super::error::ErrorBody).
#[derive(Debug, Clone, Copy, Default)]
pub struct Query<T>(pub T);

impl<T> AsRef<T> for Query<T> {
    fn as_ref(&self) -> &T {
        &self.0
    }
}

#[async_trait]
impl<S, T> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ClientError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let res = axum::extract::Query::<T>::from_request_parts(parts, state).await?;
        Ok(Query(res.0))
    }
}
