use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json
};

use crate::api::action::container::ContainerInput;
use crate::api::server::{json_rejection, required_field, Engine};

pub(crate) async fn exists(
    State(engine): State<Engine>,
    input: Result<Json<ContainerInput>, JsonRejection>,
) -> Response {
    let Json(input) = match input {
        Ok(input) => input,
        Err(rejection) => return json_rejection(rejection),
    };

    let id = match required_field(&input.id, "id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    if engine.container_exists(id) {
        "Container exists".into_response()
    } else {
        (StatusCode::NOT_FOUND, "Container not found").into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use http::StatusCode;
    use serde_json::json;
    use crate::api::server::tests::{build_context, create_container, new_test_app};

    #[tokio::test]
    async fn exists() {
        let server = TestServer::new(new_test_app()).unwrap();
        let context = build_context();
        let id = create_container(&server, "test-image", &context).await;

        let response = server.post("/container-exists").json(&json!({ "id": id })).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "Container exists");
    }

    #[tokio::test]
    async fn exists_unknown() {
        let server = TestServer::new(new_test_app()).unwrap();

        let response = server.post("/container-exists").json(&json!({ "id": "1234" })).await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "Container not found");
    }

    #[tokio::test]
    async fn exists_invalid_body() {
        let server = TestServer::new(new_test_app()).unwrap();

        let response = server
            .post("/container-exists")
            .text("id=1234")
            .content_type("application/json")
            .await;

        assert!(response.status_code().is_client_error());
    }
}
