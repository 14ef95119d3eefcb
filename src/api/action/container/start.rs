use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};

use crate::api::action::container::ContainerQuery;
use crate::api::server::{failure_with, required_param, Engine};

pub(crate) async fn start(State(engine): State<Engine>, Query(query): Query<ContainerQuery>) -> Response {
    let id = match required_param(&query.id, "id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match engine.start_container(id, query.network()).await {
        Ok(_) => "Container started".into_response(),
        Err(err) => failure_with("Failed to start container", err),
    }
}
