use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};

use crate::api::action::container::ContainerQuery;
use crate::api::server::{failure_with, required_param, Engine};

/// `id` is an image content id, every container built from it is stopped.
pub(crate) async fn stop_by_image(State(engine): State<Engine>, Query(query): Query<ContainerQuery>) -> Response {
    let content_id = match required_param(&query.id, "id") {
        Ok(content_id) => content_id,
        Err(response) => return response,
    };

    match engine.stop_containers_by_image_id(content_id).await {
        Ok(stopped) => {
            debug!("Stopped {} containers of {}", stopped.len(), content_id);
            "Container stopped".into_response()
        }
        Err(err) => failure_with("Failed to stop container", err),
    }
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use http::StatusCode;
    use crate::api::server::tests::{build_context, create_container, new_test_app};

    #[tokio::test]
    async fn stop_by_image() {
        let server = TestServer::new(new_test_app()).unwrap();
        let context = build_context();
        let id = create_container(&server, "test-image", &context).await;
        server.get("/start-container").add_query_param("id", &id).await;

        let content_id = server
            .get("/get-image-id-by-tag")
            .add_query_param("image-name", "test-image")
            .await
            .text();

        let response = server
            .get("/stop-container-by-image-id")
            .add_query_param("id", &content_id)
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "Container stopped");

        let response = server.get("/get-container-ip").add_query_param("id", &id).await;
        assert_eq!(response.text(), "Container is not running or not connected to any network");
    }

    #[tokio::test]
    async fn stop_by_unknown_image() {
        let server = TestServer::new(new_test_app()).unwrap();

        let response = server
            .get("/stop-container-by-image-id")
            .add_query_param("id", "sha256:unknown")
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "Failed to stop container: Image not found");
    }
}
