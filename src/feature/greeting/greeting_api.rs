//! Implementation of the greeting API. An API that returns a greeting based on a query parameter.

use crate::{core::greeting::greeting_service, infra::extract::Query};
use axum::{routing::get, Router};
use serde::Deserialize;
use std::fmt::Debug;
use tracing::instrument;
use utoipa::IntoParams;

/// The greeting API endpoints.
pub fn routes() -> Router {
    Router::new().route("/greet", get(greet))
}

/// A name query parameter.
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GreetingParams {
    /// Who to greet. Missing or empty greets the world.
    name: Option<String>,
}

impl GreetingParams {
    /// Constructs query parameters for greeting someone.
    pub fn new(name: Option<String>) -> Self {
        Self { name }
    }
}

impl Debug for GreetingParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)
    }
}

/// A handler for requests to the greeting endpoint.
///
/// Responds with the greeting as plain text.
#[utoipa::path(
    get,
    path = "/greet",
    params(GreetingParams),
    responses(
        (status = 200, description = "Success", body = String, content_type = "text/plain"),
    )
)]
#[instrument]
pub async fn greet(Query(params): Query<GreetingParams>) -> String {
    greeting_service::greet(params.name.as_deref())
}
