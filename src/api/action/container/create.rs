use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json
};
use serde::{Serialize, Deserialize};
use validator::Validate;

use crate::api::action::image::parse_reference;
use crate::api::server::{bad_request, failure_with, json_rejection, required_field, Engine};
use crate::models::containers::PortBinding;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

#[derive(Deserialize, Serialize, Debug, Clone, Validate)]
pub(crate) struct ContainerCreateInput {
    #[serde(rename = "image-name")]
    image_name: Option<String>,
    #[serde(default)]
    port: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1))]
    address: Option<String>,
}

pub(crate) async fn create(
    State(engine): State<Engine>,
    input: Result<Json<ContainerCreateInput>, JsonRejection>,
) -> Response {
    let Json(input) = match input {
        Ok(input) => input,
        Err(rejection) => return json_rejection(rejection),
    };

    if let Err(errors) = input.validate() {
        return bad_request(format!("Invalid container input: {}", errors));
    }

    let reference = match required_field(&input.image_name, "image-name").and_then(parse_reference) {
        Ok(reference) => reference,
        Err(response) => return response,
    };

    let port_binding = match input.port.as_deref().filter(|port| !port.is_empty()) {
        Some(port) => match port.parse::<PortBinding>() {
            Ok(binding) => Some(binding),
            Err(message) => return bad_request(message),
        },
        None => None,
    };
    let address = input.address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS);

    match engine.create_container(&reference, port_binding, address).await {
        Ok(record) => (StatusCode::CREATED, format!("Container created: {}", record.id)).into_response(),
        Err(err) => {
            error!("Failed to create container from {}: {}", reference, err);
            failure_with("Failed to create docker container", err)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use http::StatusCode;
    use serde_json::json;
    use crate::api::server::tests::{build_context, create_image, new_test_app};

    #[tokio::test]
    async fn create() {
        let server = TestServer::new(new_test_app()).unwrap();
        let context = build_context();
        create_image(&server, "test-image", &context).await;

        let response = server
            .post("/create-container")
            .json(&json!({
                "image-name": "test-image",
                "port": "8080",
                "address": "127.0.0.1",
            }))
            .await;

        assert_eq!(response.status_code(), StatusCode::CREATED);
        assert!(response.text().starts_with("Container created: "));
    }

    #[tokio::test]
    async fn create_from_unbuilt_image() {
        let server = TestServer::new(new_test_app()).unwrap();

        let response = server
            .post("/create-container")
            .json(&json!({
                "image-name": "never-built",
                "port": "8080",
                "address": "127.0.0.1",
            }))
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert!(response.text().starts_with("Failed to create docker container"));
    }

    #[tokio::test]
    async fn create_with_invalid_port() {
        let server = TestServer::new(new_test_app()).unwrap();
        let context = build_context();
        create_image(&server, "test-image", &context).await;

        let response = server
            .post("/create-container")
            .json(&json!({
                "image-name": "test-image",
                "port": "http",
            }))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "Invalid port 'http'");
    }
}
