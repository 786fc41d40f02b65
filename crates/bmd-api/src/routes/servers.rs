use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use bmd_core::Identity;
use bmd_core::batch::{self, BatchReport};
use bmd_core::gate::ServerAction;
use bmd_core::listing::ServerFilter;
use bmd_core::notice::Notices;
use bmd_core::types::ServerId;

use crate::dto::{ConsoleResponse, ObjectIds, ServerDetail, ServerIndex, ServerRow};
use crate::error::ApiError;
use crate::state::AppState;

pub const INDEX_URL: &str = "/project/servers";

pub async fn index(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(filter): Query<ServerFilter>,
) -> Json<ServerIndex> {
    let backends = state.connect(&identity);
    let mut messages = Notices::new();

    let servers = match backends.compute.list_servers(true, false).await {
        Ok(servers) => servers,
        Err(e) => {
            messages.handle(&e, "Unable to retrieve servers.");
            Vec::new()
        }
    };

    Json(ServerIndex {
        servers: filter.apply(servers).into_iter().map(ServerRow::from).collect(),
        messages,
    })
}

pub async fn batch_action(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(action): Path<String>,
    Json(req): Json<ObjectIds>,
) -> Result<Json<BatchReport>, ApiError> {
    let action: ServerAction = action.parse()?;
    let ids: Vec<ServerId> = req.object_ids.into_iter().map(ServerId).collect();

    let backends = state.connect(&identity);
    let report = batch::run_server_action(backends.compute.as_ref(), action, &ids).await?;
    tracing::info!(
        action = %action,
        succeeded = report.succeeded.len(),
        denied = report.denied.len(),
        failed = report.failed.len(),
        "server batch action"
    );
    Ok(Json(report))
}

pub async fn detail(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ServerDetail>, ApiError> {
    let backends = state.connect(&identity);
    let server_id = ServerId(id);

    let mut server = match backends.compute.get_server(&server_id).await {
        Ok(server) => server,
        Err(e) => {
            tracing::warn!(server_id = %server_id, error = %e, "server lookup failed");
            return Err(ApiError::redirect_with_error(
                INDEX_URL,
                format!("Unable to retrieve details for server \"{server_id}\"."),
            ));
        }
    };

    // Flavor is looked up separately; the page renders without it.
    if let Some(flavor_id) = server.flavor_id.clone() {
        match backends.compute.get_flavor(&flavor_id).await {
            Ok(flavor) => server.flavor = Some(flavor),
            Err(e) => tracing::debug!(flavor_id = %flavor_id, error = %e, "flavor lookup failed"),
        }
    }

    let image_url = server
        .image_id
        .as_ref()
        .map(|image| format!("/project/images/{image}"));

    Ok(Json(ServerDetail {
        row: ServerRow::from(server),
        image_url,
    }))
}

/// Re-fetch a single row for the live-refresh poller.
pub async fn row(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ServerRow>, ApiError> {
    let backends = state.connect(&identity);
    match backends.compute.get_server(&ServerId(id)).await {
        Ok(server) => Ok(Json(ServerRow::from(server))),
        Err(e) if e.is_not_found() => Err(ApiError::NotFound),
        Err(e) => Err(e.into()),
    }
}

pub async fn console(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Json<ConsoleResponse> {
    let backends = state.connect(&identity);
    let server_id = ServerId(id);

    let console_url = match backends.compute.serial_console_url(&server_id).await {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(server_id = %server_id, error = %e, "serial console unavailable");
            None
        }
    };

    Json(ConsoleResponse {
        server_id: server_id.0,
        console_url,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use bmd_core::fake::server;
    use bmd_core::types::{Flavor, Nic, PowerState, PowerTarget, ServerStatus};

    use super::super::testing::{TestApp, get, post_json};

    #[tokio::test]
    async fn index_lists_rows_with_actions() {
        let app = TestApp::new();
        let mut web = server("s-1", "web01", ServerStatus::Active, PowerState::PowerOn);
        web.nics.push(Nic {
            network_id: "net-1".into(),
            port_id: None,
            mac_address: None,
            fixed_ips: vec!["10.0.0.5".into()],
            floating_ip: Some("172.24.4.10".into()),
        });
        app.compute.add_server(web);
        app.compute
            .add_server(server("s-2", "db01", ServerStatus::Stopped, PowerState::PowerOff));

        let (status, body) = app.send(get("/project/servers?name=WEB")).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["servers"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "web01");
        assert_eq!(rows[0]["status_label"], "Active");
        assert_eq!(rows[0]["row_status"], "ok");
        assert_eq!(rows[0]["actions"], json!(["stop", "reboot", "soft_reboot", "delete"]));
        assert_eq!(rows[0]["ip_groups"]["net-1"]["floating"], json!(["172.24.4.10"]));
        assert_eq!(body["messages"], json!([]));
    }

    #[tokio::test]
    async fn index_degrades_on_backend_outage() {
        let app = TestApp::new();
        app.compute.fail_servers();

        let (status, body) = app.send(get("/project/servers")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["servers"], json!([]));
        assert_eq!(
            body["messages"],
            json!([{"level": "error", "message": "Unable to retrieve servers."}])
        );
    }

    #[tokio::test]
    async fn stop_action_is_gated_per_server() {
        let app = TestApp::new();
        app.compute
            .add_server(server("s-1", "web01", ServerStatus::Active, PowerState::PowerOn));
        app.compute
            .add_server(server("s-2", "web02", ServerStatus::Stopped, PowerState::PowerOff));

        let (status, body) = app
            .send(post_json(
                "/project/servers/actions/stop",
                json!({"object_ids": ["s-1", "s-2"]}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["succeeded"], json!(["web01"]));
        assert_eq!(body["denied"], json!(["web02"]));
        assert_eq!(
            app.compute.power_calls(),
            vec![(bmd_core::types::ServerId("s-1".into()), PowerTarget::Off)]
        );
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let app = TestApp::new();
        let (status, _) = app
            .send(post_json("/project/servers/actions/explode", json!({"object_ids": []})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn detail_attaches_flavor_when_available() {
        let app = TestApp::new();
        let mut s = server("s-1", "web01", ServerStatus::Active, PowerState::PowerOn);
        s.flavor_id = Some("flv-1".into());
        s.image_id = Some("img-1".into());
        app.compute.add_server(s);
        app.compute.add_flavor(Flavor {
            id: "flv-1".into(),
            name: "baremetal-small".into(),
            description: None,
        });

        let (status, body) = app.send(get("/project/servers/s-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["flavor"]["name"], "baremetal-small");
        assert_eq!(body["image_url"], "/project/images/img-1");
    }

    #[tokio::test]
    async fn detail_of_missing_server_redirects() {
        let app = TestApp::new();
        let (status, body) = app.send(get("/project/servers/nope")).await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(body["redirect"], "/project/servers");
        assert_eq!(
            body["messages"][0]["message"],
            "Unable to retrieve details for server \"nope\"."
        );
    }

    #[tokio::test]
    async fn row_refresh_maps_missing_to_404() {
        let app = TestApp::new();
        app.compute
            .add_server(server("s-1", "web01", ServerStatus::Building, PowerState::PowerOff));

        let (status, body) = app.send(get("/project/servers/s-1/row")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["row_status"], "pending");

        let (status, _) = app.send(get("/project/servers/gone/row")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn console_failure_yields_null_url() {
        let app = TestApp::new();
        app.compute.set_console("s-1", "ws://console/s-1");

        let (_, body) = app.send(get("/project/servers/s-1/console")).await;
        assert_eq!(body["console_url"], "ws://console/s-1");

        let (status, body) = app.send(get("/project/servers/s-2/console")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["console_url"], serde_json::Value::Null);
    }
}
