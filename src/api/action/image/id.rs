use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};

use crate::api::action::image::ImageQuery;
use crate::api::server::{failure, Engine};

pub(crate) async fn id(State(engine): State<Engine>, Query(query): Query<ImageQuery>) -> Response {
    let reference = match query.reference() {
        Ok(reference) => reference,
        Err(response) => return response,
    };

    match engine.image_content_id(&reference).await {
        Ok(content_id) => content_id.into_response(),
        Err(err) => failure(err),
    }
}
