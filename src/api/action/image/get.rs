use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};

use crate::api::action::image::ImageQuery;
use crate::api::server::{failure, Engine};

pub(crate) async fn get(State(engine): State<Engine>, Query(query): Query<ImageQuery>) -> Response {
    let reference = match query.reference() {
        Ok(reference) => reference,
        Err(response) => return response,
    };

    match engine.get_image(&reference).await {
        Ok(record) => record.reference.to_string().into_response(),
        Err(err) => failure(err),
    }
}
