use std::path::PathBuf;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json
};
use serde::{Serialize, Deserialize};
use validator::Validate;

use crate::api::action::image::parse_reference;
use crate::api::server::{bad_request, failure, json_rejection, required_field, Engine};

#[derive(Deserialize, Serialize, Debug, Clone, Validate)]
pub(crate) struct ImageInput {
    #[serde(rename = "image-name")]
    #[validate(length(min = 1, max = 255))]
    image_name: Option<String>,
    #[serde(rename = "source-dir")]
    #[validate(length(min = 1))]
    source_dir: Option<String>,
}

pub(crate) async fn create(
    State(engine): State<Engine>,
    input: Result<Json<ImageInput>, JsonRejection>,
) -> Response {
    let Json(input) = match input {
        Ok(input) => input,
        Err(rejection) => return json_rejection(rejection),
    };

    if let Err(errors) = input.validate() {
        return bad_request(format!("Invalid image input: {}", errors));
    }

    let reference = match required_field(&input.image_name, "image-name").and_then(parse_reference) {
        Ok(reference) => reference,
        Err(response) => return response,
    };
    let source_dir = match required_field(&input.source_dir, "source-dir") {
        Ok(source_dir) => PathBuf::from(source_dir),
        Err(response) => return response,
    };

    match engine.build_image(&reference, &source_dir).await {
        Ok(record) => (StatusCode::CREATED, record.reference.to_string()).into_response(),
        Err(err) => {
            error!("Failed to build image {}: {}", reference, err);
            failure(err)
        }
    }
}
