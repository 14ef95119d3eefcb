use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json
};

use crate::api::action::container::ContainerInput;
use crate::api::server::{failure, json_rejection, required_field, Engine};

pub(crate) async fn delete(
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

    match engine.delete_container(id).await {
        Ok(_) => "Container deleted".into_response(),
        Err(err) => failure(err),
    }
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use http::StatusCode;
    use serde_json::json;
    use crate::api::server::tests::{build_context, create_container, new_test_app};

    #[tokio::test]
    async fn delete() {
        let server = TestServer::new(new_test_app()).unwrap();
        let context = build_context();
        let id = create_container(&server, "test-image", &context).await;

        let response = server.post("/delete-container").json(&json!({ "id": id })).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "Container deleted");

        let response = server.post("/container-exists").json(&json!({ "id": id })).await;
        assert_eq!(response.text(), "Container not found");
    }

    #[tokio::test]
    async fn delete_unknown() {
        let server = TestServer::new(new_test_app()).unwrap();

        let response = server.post("/delete-container").json(&json!({ "id": "1234" })).await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "Error response from daemon: No such container: 1234");
    }

    #[tokio::test]
    async fn delete_running() {
        let server = TestServer::new(new_test_app()).unwrap();
        let context = build_context();
        let id = create_container(&server, "test-image", &context).await;
        server.get("/start-container").add_query_param("id", &id).await;

        let response = server.post("/delete-container").json(&json!({ "id": id })).await;

        assert_eq!(response.status_code(), StatusCode::CONFLICT);
    }
}
