use std::sync::Arc;
use std::{net::SocketAddr, time::Duration};
use axum::{
    error_handling::HandleErrorLayer,
    extract::rejection::JsonRejection,
    http::StatusCode,
    routing::{get, post},
    Router,
    response::{IntoResponse, Response},
};
use tower::{BoxError, ServiceBuilder};

use crate::config::config::Config;
use crate::orchestrator::error::EngineError;
use crate::orchestrator::orchestrator::Orchestrator;
use crate::runtime::error::RuntimeError;

use crate::api::action::hello::hello;
use crate::api::action::healthz::healthz;

use crate::api::action::image::create as image_create;
use crate::api::action::image::get as image_get;
use crate::api::action::image::delete as image_delete;
use crate::api::action::image::id as image_id;

use crate::api::action::container::create as container_create;
use crate::api::action::container::get as container_get;
use crate::api::action::container::start as container_start;
use crate::api::action::container::stop as container_stop;
use crate::api::action::container::stop_by_image as container_stop_by_image;
use crate::api::action::container::delete as container_delete;
use crate::api::action::container::exists as container_exists;
use crate::api::action::container::ip as container_ip;

pub(crate) type Engine = Arc<Orchestrator>;

pub(crate) fn status_of(err: &EngineError) -> StatusCode {
    match err {
        EngineError::ImageNotFound(_) | EngineError::ContainerNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ImageAlreadyExists(_) | EngineError::ImageInUse { .. } | EngineError::InvalidState { .. } => StatusCode::CONFLICT,
        EngineError::StopFailed(failures) => failures
            .first()
            .map(|(_, err)| status_of(err))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        EngineError::Runtime(RuntimeError::NotFound(_)) => StatusCode::NOT_FOUND,
        EngineError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

pub(crate) fn failure(err: EngineError) -> Response {
    (status_of(&err), err.to_string()).into_response()
}

pub(crate) fn failure_with(prefix: &str, err: EngineError) -> Response {
    (status_of(&err), format!("{}: {}", prefix, err)).into_response()
}

pub(crate) fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}

/// Body field that must be present and non-empty.
pub(crate) fn required_field<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, Response> {
    match value.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(bad_request(format!("Missing '{}'", field))),
    }
}

/// Query parameter that must be present and non-empty.
pub(crate) fn required_param<'a>(value: &'a Option<String>, param: &str) -> Result<&'a str, Response> {
    match value.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(bad_request(format!("Url Param '{}' is missing", param))),
    }
}

pub(crate) fn json_rejection(rejection: JsonRejection) -> Response {
    debug!("Rejected request body: {}", rejection);
    (rejection.status(), rejection.body_text()).into_response()
}

pub(crate) fn router(engine: Engine, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/healthz", get(healthz))
        .route("/create-image", post(image_create))
        .route("/get-image", get(image_get))
        .route("/delete-image", post(image_delete))
        .route("/get-image-id-by-tag", get(image_id))
        .route("/create-container", post(container_create))
        .route("/get-container", get(container_get))
        .route("/start-container", get(container_start))
        .route("/stop-container", get(container_stop))
        .route("/stop-container-by-image-id", get(container_stop_by_image))
        .route("/delete-container", post(container_delete))
        .route("/container-exists", post(container_exists))
        .route("/get-container-ip", get(container_ip))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|error: BoxError| async move {
                    if error.is::<tower::timeout::error::Elapsed>() {
                        (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
                    } else {
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            format!("Unhandled internal error: {}", error),
                        )
                    }
                }))
                .timeout(request_timeout)
                .into_inner(),
        )
        .with_state(engine)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", err);
        return;
    }
    info!("Shutdown requested");
}

pub(crate) async fn start(engine: Engine, configuration: Config) -> std::io::Result<()> {
    info!("Starting server on {}", configuration.get_api_url());

    // A request may chain several daemon calls, each bounded on its own.
    let request_timeout = Duration::from_secs(configuration.docker.timeout.saturating_mul(4).max(10));
    let app = router(engine, request_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], configuration.api.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
