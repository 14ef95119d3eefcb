use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};

use crate::api::action::container::ContainerQuery;
use crate::api::server::{failure, required_param, Engine};

pub(crate) async fn ip(State(engine): State<Engine>, Query(query): Query<ContainerQuery>) -> Response {
    let id = match required_param(&query.id, "id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match engine.container_ip(id, query.network()).await {
        Ok(address) => address.to_string().into_response(),
        Err(err) => failure(err),
    }
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use http::StatusCode;
    use crate::api::server::tests::{build_context, create_container, new_test_app};

    #[tokio::test]
    async fn ip_before_start() {
        let server = TestServer::new(new_test_app()).unwrap();
        let context = build_context();
        let id = create_container(&server, "test-image", &context).await;

        let response = server.get("/get-container-ip").add_query_param("id", &id).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "Container is not running or not connected to any network");
    }

    #[tokio::test]
    async fn ip_while_running() {
        let server = TestServer::new(new_test_app()).unwrap();
        let context = build_context();
        let id = create_container(&server, "test-image", &context).await;
        server
            .get("/start-container")
            .add_query_param("id", &id)
            .add_query_param("network", "dockyard")
            .await;

        let response = server
            .get("/get-container-ip")
            .add_query_param("id", &id)
            .add_query_param("network", "dockyard")
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let address = response.text();
        assert!(address.starts_with("172.27.0."), "unexpected address {}", address);
        assert!(address.ends_with("/16"));
    }

    #[tokio::test]
    async fn ip_unknown_container() {
        let server = TestServer::new(new_test_app()).unwrap();

        let response = server.get("/get-container-ip").add_query_param("id", "1234").await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "Error response from daemon: No such container: 1234");
    }
}
