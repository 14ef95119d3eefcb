use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};

use crate::api::action::container::ContainerQuery;
use crate::api::server::{failure_with, required_param, Engine};

pub(crate) async fn stop(State(engine): State<Engine>, Query(query): Query<ContainerQuery>) -> Response {
    let id = match required_param(&query.id, "id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match engine.stop_container(id).await {
        Ok(_) => "Container stopped".into_response(),
        Err(err) => failure_with("Failed to stop container", err),
    }
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use http::StatusCode;
    use crate::api::server::tests::{build_context, create_container, new_test_app};

    #[tokio::test]
    async fn stop() {
        let server = TestServer::new(new_test_app()).unwrap();
        let context = build_context();
        let id = create_container(&server, "test-image", &context).await;
        server.get("/start-container").add_query_param("id", &id).await;

        for _ in 0..2 {
            let response = server.get("/stop-container").add_query_param("id", &id).await;

            assert_eq!(response.status_code(), StatusCode::OK);
            assert_eq!(response.text(), "Container stopped");
        }

        let response = server.get("/start-container").add_query_param("id", &id).await;
        assert_eq!(response.text(), "Container started");
    }

    #[tokio::test]
    async fn stop_never_started() {
        let server = TestServer::new(new_test_app()).unwrap();
        let context = build_context();
        let id = create_container(&server, "test-image", &context).await;

        let response = server.get("/stop-container").add_query_param("id", &id).await;

        assert_eq!(response.text(), "Container stopped");
    }

    #[tokio::test]
    async fn stop_without_id() {
        let server = TestServer::new(new_test_app()).unwrap();

        let response = server.get("/stop-container").await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "Url Param 'id' is missing");
    }
}
