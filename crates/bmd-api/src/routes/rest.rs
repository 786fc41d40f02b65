use axum::extract::State;
use axum::{Extension, Json};

use bmd_core::Identity;

use crate::dto::ServerList;
use crate::error::ApiError;
use crate::state::AppState;

/// Read-only server listing for client-side widgets.
pub async fn list_servers(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ServerList>, ApiError> {
    let backends = state.connect(&identity);
    let servers = backends.compute.list_servers(true, false).await?;
    Ok(Json(ServerList { servers }))
}
