use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use bmd_core::Identity;
use bmd_core::batch::{self, BatchReport};
use bmd_core::keypair::{slugify, validate_name, validate_public_key};
use bmd_core::listing::filter_keypairs;
use bmd_core::notice::Notices;
use bmd_core::types::KeyPair;

use crate::dto::{
    CreateKeyPairRequest, ImportKeyPairRequest, KeyPairDownload, KeyPairIndex, KeyPairSearch,
    ObjectIds,
};
use crate::error::{ApiError, Redirect};
use crate::state::AppState;

pub const INDEX_URL: &str = "/project/server_key_pairs";

const NO_STORE: &str = "max-age=0, no-cache, no-store, must-revalidate";

fn keypair_url(name: &str, suffix: &str) -> String {
    format!("{INDEX_URL}/{}{suffix}", urlencoding::encode(name))
}

pub async fn index(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(search): Query<KeyPairSearch>,
) -> Json<KeyPairIndex> {
    let backends = state.connect(&identity);
    let mut messages = Notices::new();

    let keypairs = match backends.compute.list_keypairs().await {
        Ok(keypairs) => keypairs,
        Err(e) => {
            messages.handle(&e, "Unable to retrieve key pair list.");
            Vec::new()
        }
    };
    let keypairs = match search.q.as_deref() {
        Some(q) => filter_keypairs(keypairs, q),
        None => keypairs,
    };

    Json(KeyPairIndex { keypairs, messages })
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ObjectIds>,
) -> Json<BatchReport> {
    let backends = state.connect(&identity);
    Json(batch::delete_keypairs(backends.compute.as_ref(), &req.object_ids).await)
}

/// Validate the name, then send the browser to the download page which
/// triggers generation.
pub async fn create(Json(req): Json<CreateKeyPairRequest>) -> Result<Redirect, ApiError> {
    validate_name(&req.name).map_err(ApiError::BadRequest)?;
    Ok(Redirect::to(keypair_url(req.name.trim(), "/download")))
}

pub async fn import(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ImportKeyPairRequest>,
) -> Result<Redirect, ApiError> {
    validate_name(&req.name).map_err(ApiError::BadRequest)?;
    validate_public_key(&req.public_key).map_err(ApiError::BadRequest)?;

    let name = req.name.trim();
    let backends = state.connect(&identity);
    let mut messages = Notices::new();
    match backends.compute.create_keypair(name, Some(req.public_key.trim())).await {
        Ok(keypair) => {
            tracing::info!(keypair = %keypair.name, "imported key pair");
            messages.success(format!("Successfully imported public key: {}", keypair.name));
        }
        Err(e) => messages.handle(&e, "Unable to import key pair."),
    }
    Ok(Redirect::to(INDEX_URL).with_messages(messages))
}

pub async fn detail(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(name): Path<String>,
) -> Result<Json<KeyPair>, ApiError> {
    let backends = state.connect(&identity);
    match backends.compute.get_keypair(&name).await {
        Ok(keypair) => Ok(Json(keypair)),
        Err(e) => {
            tracing::warn!(keypair = %name, error = %e, "key pair lookup failed");
            Err(ApiError::redirect_with_error(
                INDEX_URL,
                format!("Unable to retrieve details for keypair \"{name}\"."),
            ))
        }
    }
}

pub async fn download(Path(name): Path<String>) -> Json<KeyPairDownload> {
    Json(KeyPairDownload {
        generate_url: keypair_url(&name, "/generate"),
        regenerate_url: keypair_url(&name, "/generate/regenerate"),
        keypair_name: name,
    })
}

pub async fn generate(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    generate_keypair(&state, &identity, &name, false).await
}

pub async fn regenerate(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    generate_keypair(&state, &identity, &name, true).await
}

/// Create the key pair (deleting it first when regenerating) and return the
/// private key as a file download. The key is never stored server-side.
async fn generate_keypair(
    state: &AppState,
    identity: &Identity,
    name: &str,
    regenerate: bool,
) -> Result<Response, ApiError> {
    let backends = state.connect(identity);

    let created: bmd_core::Result<KeyPair> = async {
        if regenerate {
            backends.compute.delete_keypair(name).await?;
        }
        backends.compute.create_keypair(name, None).await
    }
    .await;

    let keypair = match created {
        Ok(keypair) => keypair,
        Err(e) => {
            tracing::warn!(keypair = %name, regenerate, error = %e, "key pair generation failed");
            return Err(ApiError::redirect_with_error(
                INDEX_URL,
                format!("Unable to create key pair: {e}"),
            ));
        }
    };

    let private_key = keypair
        .private_key
        .ok_or_else(|| ApiError::Internal(format!("no private key returned for {}", keypair.name)))?;
    tracing::info!(keypair = %keypair.name, regenerate, "generated key pair");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/binary".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}.pem", slugify(&keypair.name)),
            ),
            (header::CONTENT_LENGTH, private_key.len().to_string()),
            (header::CACHE_CONTROL, NO_STORE.to_string()),
        ],
        private_key,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::http::{StatusCode, header};
    use serde_json::json;

    use super::super::testing::{TestApp, get, post_json};
    use super::keypair_url;

    #[tokio::test]
    async fn index_filters_by_query() {
        let app = TestApp::new();
        app.compute.add_keypair("deploy");
        app.compute.add_keypair("ops");

        let (status, body) = app.send(get("/project/server_key_pairs?q=DEP")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["keypairs"].as_array().unwrap().len(), 1);
        assert_eq!(body["keypairs"][0]["name"], "deploy");
        assert_eq!(body["keypairs"][0]["fingerprint"], "fp:deploy");
    }

    #[tokio::test]
    async fn index_outage_reports_message() {
        let app = TestApp::new();
        app.compute.fail_keypairs();

        let (_, body) = app.send(get("/project/server_key_pairs")).await;
        assert_eq!(body["keypairs"], json!([]));
        assert_eq!(body["messages"][0]["message"], "Unable to retrieve key pair list.");
    }

    #[tokio::test]
    async fn create_validates_then_redirects_to_download() {
        let app = TestApp::new();

        let (status, body) = app
            .send(post_json("/project/server_key_pairs/create", json!({"name": "bad/name"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Key pair name may only contain letters, numbers, underscores, spaces, and hyphens."
        );

        let (status, body) = app
            .send(post_json("/project/server_key_pairs/create", json!({"name": "My Key"})))
            .await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(body["redirect"], "/project/server_key_pairs/My%20Key/download");
        assert!(app.compute.keypair_names().is_empty());
    }

    #[tokio::test]
    async fn generate_returns_private_key_download() {
        let app = TestApp::new();

        let response = app.raw(get("/project/server_key_pairs/My%20Key/generate")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers[header::CONTENT_TYPE], "application/binary");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=my-key.pem"
        );
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "max-age=0, no-cache, no-store, must-revalidate"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(headers[header::CONTENT_LENGTH], body.len().to_string().as_str());
        assert!(String::from_utf8_lossy(&body).contains("fake-My Key"));
        assert_eq!(app.compute.keypair_names(), vec!["My Key"]);
    }

    #[tokio::test]
    async fn generated_filename_is_ascii_folded() {
        let app = TestApp::new();

        let response = app
            .raw(get("/project/server_key_pairs/Cl%C3%A9%20%C3%89t%C3%A9/generate"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=cle-ete.pem"
        );
        assert_eq!(app.compute.keypair_names(), vec!["Clé Été"]);
    }

    #[tokio::test]
    async fn generate_existing_key_redirects_with_error() {
        let app = TestApp::new();
        app.compute.add_keypair("kp1");

        let (status, body) = app.send(get("/project/server_key_pairs/kp1/generate")).await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(body["redirect"], "/project/server_key_pairs");
        let message = body["messages"][0]["message"].as_str().unwrap();
        assert!(message.starts_with("Unable to create key pair: "), "{message}");
    }

    #[tokio::test]
    async fn regenerate_replaces_existing_key() {
        let app = TestApp::new();
        app.compute.add_keypair("kp1");

        let response = app.raw(get("/project/server_key_pairs/kp1/generate/regenerate")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.compute.keypair_names(), vec!["kp1"]);
    }

    #[tokio::test]
    async fn import_requires_public_key() {
        let app = TestApp::new();
        let (status, _) = app
            .send(post_json(
                "/project/server_key_pairs/import",
                json!({"name": "laptop", "public_key": "  "}),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send(post_json(
                "/project/server_key_pairs/import",
                json!({"name": "laptop", "public_key": "ssh-ed25519 AAAA me@laptop"}),
            ))
            .await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(body["redirect"], "/project/server_key_pairs");
        assert_eq!(
            body["messages"][0]["message"],
            "Successfully imported public key: laptop"
        );
    }

    #[tokio::test]
    async fn detail_hides_private_key_and_redirects_when_missing() {
        let app = TestApp::new();
        app.compute.add_keypair("kp1");

        let (status, body) = app.send(get("/project/server_key_pairs/kp1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "kp1");
        assert!(body.get("private_key").is_none());

        let (status, body) = app.send(get("/project/server_key_pairs/ghost")).await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(
            body["messages"][0]["message"],
            "Unable to retrieve details for keypair \"ghost\"."
        );
    }

    #[tokio::test]
    async fn delete_reports_each_key() {
        let app = TestApp::new();
        app.compute.add_keypair("kp1");

        let (status, body) = app
            .send(post_json(
                "/project/server_key_pairs/delete",
                json!({"object_ids": ["kp1", "missing"]}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["succeeded"], json!(["kp1"]));
        assert_eq!(body["failed"], json!(["missing"]));
    }

    #[test]
    fn names_are_encoded_for_urls() {
        assert_eq!(
            keypair_url("my key", "/download"),
            "/project/server_key_pairs/my%20key/download"
        );
        assert_eq!(keypair_url("ops_1-a", ""), "/project/server_key_pairs/ops_1-a");
        assert_eq!(keypair_url("a?b/c", ""), "/project/server_key_pairs/a%3Fb%2Fc");
    }
}
