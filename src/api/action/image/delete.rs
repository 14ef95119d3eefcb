use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json
};
use serde::Deserialize;

use crate::api::action::image::parse_reference;
use crate::api::server::{failure, json_rejection, required_field, Engine};

#[derive(Deserialize, Debug)]
pub(crate) struct DeleteImageInput {
    #[serde(rename = "image-name")]
    image_name: Option<String>,
}

pub(crate) async fn delete(
    State(engine): State<Engine>,
    input: Result<Json<DeleteImageInput>, JsonRejection>,
) -> Response {
    let Json(input) = match input {
        Ok(input) => input,
        Err(rejection) => return json_rejection(rejection),
    };

    let reference = match required_field(&input.image_name, "image-name").and_then(parse_reference) {
        Ok(reference) => reference,
        Err(response) => return response,
    };

    match engine.delete_image(&reference).await {
        Ok(_) => "Delete completed".into_response(),
        Err(err) => {
            info!("Image {} not deleted: {}", reference, err);
            failure(err)
        }
    }
}
