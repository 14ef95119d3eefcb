use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::action::container::ContainerQuery;
use crate::api::server::{required_param, Engine};

pub(crate) async fn get(State(engine): State<Engine>, Query(query): Query<ContainerQuery>) -> Response {
    let id = match required_param(&query.id, "id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match engine.get_container(id) {
        Ok(_) => "Container found".into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Container not found").into_response(),
    }
}
