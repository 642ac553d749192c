//! The HTTP server.
//!
//! # Examples
//!
//! Greeting someone.
//!
//! ```rust
//! # tokio_test::block_on(async {
//! # let url = greeting_service::server::spawn_app().await.unwrap();
//! let response = reqwest::get(format!("{url}/greet?name=Foo")).await.unwrap();
//! assert_eq!(200, response.status());
//! assert_eq!("Hello, Foo!", response.text().await.unwrap());
//! # });
//! ```
//!
//! Greeting the world.
//!
//! ```rust
//! # tokio_test::block_on(async {
//! # let url = greeting_service::server::spawn_app().await.unwrap();
//! let response = reqwest::get(format!("{url}/greet")).await.unwrap();
//! assert_eq!(200, response.status());
//! assert_eq!("Hello, World!", response.text().await.unwrap());
//! # });
//! ```

use crate::{
    feature::greeting::greeting_api,
    infra::{
        config::ServerConfig,
        error::{not_found, InternalError, PanicHandler},
        middleware::MakeRequestIdSpan,
        openapi::ApiDoc,
        shutdown::shutdown_signal,
    },
};
use axum::{
    error_handling::HandleErrorLayer, response::IntoResponse, routing::get, BoxError, Json,
    Router,
};
use http::header::AUTHORIZATION;
use std::iter;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;

/// Constructs the full axum application.
pub fn app(config: &ServerConfig) -> Router {
    let mut router = Router::new().merge(greeting_api::routes());
    if config.expose_openapi {
        router = router.route("/api/openapi.json", get(openapi));
    }
    with_middleware(router.fallback(not_found), config)
}

/// Wraps every route of `router` in the middleware stack.
///
/// The concurrency limit applies to each route separately.
/// Requests beyond it are shed with a 503 instead of queueing.
fn with_middleware(router: Router, config: &ServerConfig) -> Router {
    // Fallible middleware from tower, mapped to infallible response with [`HandleErrorLayer`].
    let tower_middleware = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|e: BoxError| async move {
            InternalError::from(e).into_response()
        }))
        .load_shed()
        .concurrency_limit(config.concurrency_limit);

    router
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(MakeRequestIdSpan)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(()),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveRequestHeadersLayer::new(iter::once(
            AUTHORIZATION,
        )))
        .layer(tower_middleware)
        .layer(CatchPanicLayer::custom(PanicHandler))
}

/// Serves the OpenAPI document.
async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Starts the axum server and runs it until ctrl-c is pressed.
pub async fn run_app(listener: TcpListener, config: ServerConfig) -> std::io::Result<()> {
    let app = app(&config);

    tracing::info!("Starting axum on {}", listener.local_addr()?);
    let exit_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    match &exit_result {
        Ok(_) => tracing::info!("Successfully shut down"),
        Err(e) => tracing::error!("Shutdown failed: {}", e),
    }

    exit_result
}

/// Spawn a server on a random port.
pub async fn spawn_app() -> std::io::Result<String> {
    spawn_app_with_config(ServerConfig::default()).await
}

/// Spawn a server on a random port with a custom configuration.
///
/// Returns the base url of the server.
pub async fn spawn_app_with_config(config: ServerConfig) -> std::io::Result<String> {
    let address = "127.0.0.1";
    let listener = TcpListener::bind(format!("{address}:0")).await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(run_app(listener, config));
    Ok(format!("http://{address}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::error::ErrorBody;
    use axum::body::Body;
    use http::{header::CONTENT_TYPE, Request, Response, StatusCode};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_millis(300)).await;
        "done"
    }

    async fn panics() -> &'static str {
        panic!("handler failed")
    }

    fn test_app_with(router: Router, config: ServerConfig) -> Router {
        with_middleware(router, &config)
    }

    fn slow_app(config: ServerConfig) -> Router {
        test_app_with(Router::new().route("/slow", axum::routing::get(slow)), config)
    }

    fn test_app() -> Router {
        app(&ServerConfig::default())
    }

    async fn body_string(res: Response<Body>) -> String {
        let body = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    async fn get(app: Router, uri: &str) -> Response<Body> {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        app.oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn greet_oneshot() {
        let res = get(test_app(), "/greet?name=Alice").await;
        assert_eq!(StatusCode::OK, res.status());
        assert_eq!("Hello, Alice!", body_string(res).await);
    }

    #[tokio::test]
    async fn greet_without_name_oneshot() {
        let res = get(test_app(), "/greet").await;
        assert_eq!(StatusCode::OK, res.status());
        assert_eq!("Hello, World!", body_string(res).await);
    }

    #[tokio::test]
    async fn greet_with_empty_name_oneshot() {
        let res = get(test_app(), "/greet?name=").await;
        assert_eq!(StatusCode::OK, res.status());
        assert_eq!("Hello, World!", body_string(res).await);
    }

    #[tokio::test]
    async fn greet_decodes_name() {
        let res = get(test_app(), "/greet?name=Jane%20Doe%21").await;
        assert_eq!(StatusCode::OK, res.status());
        assert_eq!("Hello, Jane Doe!!", body_string(res).await);
    }

    #[tokio::test]
    async fn greet_ignores_other_parameters() {
        let res = get(test_app(), "/greet?lang=en&name=Bob").await;
        assert_eq!(StatusCode::OK, res.status());
        assert_eq!("Hello, Bob!", body_string(res).await);
    }

    #[tokio::test]
    async fn greet_responds_with_plain_text() {
        let res = get(test_app(), "/greet?name=Alice").await;
        assert_eq!("text/plain; charset=utf-8", res.headers()[CONTENT_TYPE]);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let res = get(test_app(), "/greet?name=a&name=b").await;
        assert_eq!(StatusCode::BAD_REQUEST, res.status());
        let body: ErrorBody = serde_json::from_str(&body_string(res).await).unwrap();
        assert!(body.message().contains("name"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let res = get(test_app(), "/hello").await;
        assert_eq!(StatusCode::NOT_FOUND, res.status());
        let body: ErrorBody = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!("not found", body.message());
    }

    #[tokio::test]
    async fn request_id_is_generated() {
        let res = get(test_app(), "/greet").await;
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn request_id_is_propagated() {
        let req = Request::get("/greet")
            .header("x-request-id", "my-request")
            .body(Body::empty())
            .unwrap();
        let res = test_app().oneshot(req).await.unwrap();
        assert_eq!("my-request", res.headers()["x-request-id"]);
    }

    #[tokio::test]
    async fn openapi_is_hidden_by_default() {
        let res = get(test_app(), "/api/openapi.json").await;
        assert_eq!(StatusCode::NOT_FOUND, res.status());
    }

    #[tokio::test]
    async fn openapi_can_be_exposed() {
        let config = ServerConfig {
            expose_openapi: true,
            ..ServerConfig::default()
        };
        let res = get(app(&config), "/api/openapi.json").await;
        assert_eq!(StatusCode::OK, res.status());
        let doc: serde_json::Value = serde_json::from_str(&body_string(res).await).unwrap();
        assert!(doc["paths"]["/greet"]["get"].is_object());
    }

    #[tokio::test]
    async fn slow_request_times_out() {
        let config = ServerConfig {
            request_timeout: Duration::from_millis(10),
            ..ServerConfig::default()
        };
        let app = slow_app(config);
        let res = get(app, "/slow").await;
        assert_eq!(StatusCode::REQUEST_TIMEOUT, res.status());
    }

    #[tokio::test]
    async fn request_within_timeout_succeeds() {
        let app = slow_app(ServerConfig::default());
        let res = get(app, "/slow").await;
        assert_eq!(StatusCode::OK, res.status());
        assert_eq!("done", body_string(res).await);
    }

    #[tokio::test]
    async fn panic_becomes_internal_error() {
        let app = test_app_with(
            Router::new().route("/panic", axum::routing::get(panics)),
            ServerConfig::default(),
        );
        let res = get(app, "/panic").await;
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, res.status());
        assert_eq!("5", res.headers()["Retry-After"]);
        let body: ErrorBody = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!("internal error", body.message());
    }

    #[tokio::test]
    async fn requests_over_the_concurrency_limit_are_shed() {
        let config = ServerConfig {
            concurrency_limit: 1,
            ..ServerConfig::default()
        };
        let app = slow_app(config);

        let first = tokio::spawn(get(app.clone(), "/slow"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = get(app.clone(), "/slow").await;
        assert_eq!(StatusCode::SERVICE_UNAVAILABLE, second.status());
        let body: ErrorBody = serde_json::from_str(&body_string(second).await).unwrap();
        assert_eq!("internal error", body.message());

        let first = first.await.unwrap();
        assert_eq!(StatusCode::OK, first.status());

        let third = get(app, "/slow").await;
        assert_eq!(StatusCode::OK, third.status());
    }

    #[tokio::test]
    async fn greet_over_http() {
        let url = spawn_app().await.unwrap();
        let response = reqwest::get(format!("{url}/greet?name=Alice")).await.unwrap();
        assert_eq!(200, response.status());
        assert_eq!("Hello, Alice!", response.text().await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_greetings_over_http() {
        let url = spawn_app().await.unwrap();
        let client = reqwest::Client::new();
        let requests = (0..20).map(|i| {
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move {
                let text = client
                    .get(format!("{url}/greet?name=user{i}"))
                    .send()
                    .await
                    .unwrap()
                    .text()
                    .await
                    .unwrap();
                (i, text)
            })
        });
        for request in requests.collect::<Vec<_>>() {
            let (i, text) = request.await.unwrap();
            assert_eq!(format!("Hello, user{i}!"), text);
        }
    }
}
