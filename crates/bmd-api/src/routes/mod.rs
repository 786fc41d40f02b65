pub mod keypairs;
pub mod launch;
pub mod rest;
pub mod servers;

use axum::routing::{get, post};
use axum::{Json, Router, middleware};

use crate::auth::identity_middleware;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    let authed = Router::new()
        // REST listing
        .route("/api/baremetal/servers/", get(rest::list_servers))
        // Servers
        .route("/project/servers", get(servers::index))
        .route(
            "/project/servers/actions/{action}",
            post(servers::batch_action),
        )
        // Launch workflow
        .route(
            "/project/servers/launch",
            get(launch::render).post(launch::submit),
        )
        .route(
            "/project/servers/launch/steps/{slug}",
            post(launch::submit_step),
        )
        .route("/project/servers/{id}", get(servers::detail))
        .route("/project/servers/{id}/row", get(servers::row))
        .route("/project/servers/{id}/console", get(servers::console))
        // Key pairs
        .route("/project/server_key_pairs", get(keypairs::index))
        .route("/project/server_key_pairs/delete", post(keypairs::delete))
        .route("/project/server_key_pairs/create", post(keypairs::create))
        .route("/project/server_key_pairs/import", post(keypairs::import))
        .route("/project/server_key_pairs/{name}", get(keypairs::detail))
        .route(
            "/project/server_key_pairs/{name}/download",
            get(keypairs::download),
        )
        .route(
            "/project/server_key_pairs/{name}/generate",
            get(keypairs::generate),
        )
        .route(
            "/project/server_key_pairs/{name}/generate/regenerate",
            get(keypairs::regenerate),
        )
        // Identity headers
        .layer(middleware::from_fn(identity_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(authed)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}


#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    use super::testing::{TestApp, get};

    #[tokio::test]
    async fn health_needs_no_identity() {
        let app = TestApp::new();
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = app.send(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn project_routes_require_a_token() {
        let app = TestApp::new();
        let req = Request::get("/project/servers").body(Body::empty()).unwrap();
        let (status, body) = app.send(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
        assert!(app.factory.connected_projects().is_empty());
    }

    #[tokio::test]
    async fn each_request_connects_with_its_own_identity() {
        let app = TestApp::new();
        app.send(get("/project/servers")).await;
        app.send(get("/project/server_key_pairs")).await;
        assert_eq!(app.factory.connected_projects(), vec!["proj-1", "proj-1"]);
    }
}
