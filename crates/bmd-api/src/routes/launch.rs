use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use bmd_core::Identity;
use bmd_core::workflow::{LaunchOutcome, LaunchWorkflow, RenderedWorkflow, StepOutcome};

use crate::dto::{LaunchRequest, StepRequest};
use crate::error::{ApiError, Redirect};
use crate::routes::servers;
use crate::state::AppState;

/// Every step with fresh choices, seeded from the caller's identity.
pub async fn render(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Json<RenderedWorkflow> {
    let backends = state.connect(&identity);
    Json(LaunchWorkflow::new(&backends, &identity).render(None).await)
}

pub async fn submit_step(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(slug): Path<String>,
    Json(req): Json<StepRequest>,
) -> Result<Json<StepOutcome>, ApiError> {
    let submission = req.form.into_submission()?;
    let backends = state.connect(&identity);
    let outcome = LaunchWorkflow::new(&backends, &identity)
        .submit_step(&slug, req.context, &submission)
        .await?;
    Ok(Json(outcome))
}

/// Run the whole workflow. A submitted or failed launch redirects to the
/// server list with its message; a rejected step comes back for correction.
pub async fn submit(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<LaunchRequest>,
) -> Result<Response, ApiError> {
    let mut submissions = BTreeMap::new();
    for (slug, form) in req.steps {
        submissions.insert(slug, form.into_submission()?);
    }

    let backends = state.connect(&identity);
    let report = LaunchWorkflow::new(&backends, &identity)
        .submit(&submissions)
        .await;

    Ok(match report.outcome {
        LaunchOutcome::Submitted { .. } | LaunchOutcome::Failed { .. } => {
            Redirect::to(servers::INDEX_URL)
                .with_messages(report.messages)
                .into_response()
        }
        LaunchOutcome::Rejected { .. } => (StatusCode::BAD_REQUEST, Json(report)).into_response(),
    })
}
