use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use bmd_core::gate::ServerAction;
use bmd_core::notice::Notices;
use bmd_core::types::{IpGroup, KeyPair, RowStatus, Server};
use bmd_core::workflow::WorkflowContext;
use bmd_core::workflow::form::{FieldValue, StepSubmission, UploadedFile};

use crate::error::ApiError;

// ── Requests ───────────────────────────────────────────────────────

/// Selected rows of a table action.
#[derive(Debug, Deserialize)]
pub struct ObjectIds {
    pub object_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct KeyPairSearch {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyPairRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportKeyPairRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub public_key: String,
}

/// A file input; the content is base64 so it survives JSON transport.
#[derive(Debug, Deserialize)]
pub struct FileUpload {
    pub filename: String,
    pub content: String,
}

/// The inputs of one workflow step.
#[derive(Debug, Default, Deserialize)]
pub struct StepForm {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub files: BTreeMap<String, FileUpload>,
}

impl StepForm {
    pub fn into_submission(self) -> Result<StepSubmission, ApiError> {
        let mut files = BTreeMap::new();
        for (name, upload) in self.files {
            let content = STANDARD.decode(upload.content.trim()).map_err(|e| {
                ApiError::BadRequest(format!("file {name} is not valid base64: {e}"))
            })?;
            files.insert(
                name,
                UploadedFile {
                    filename: upload.filename,
                    content,
                },
            );
        }
        Ok(StepSubmission {
            fields: self.fields,
            files,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StepRequest {
    /// Context accumulated by earlier steps, echoed back by the browser.
    #[serde(default)]
    pub context: WorkflowContext,
    #[serde(flatten)]
    pub form: StepForm,
}

#[derive(Debug, Deserialize)]
pub struct LaunchRequest {
    #[serde(default)]
    pub steps: BTreeMap<String, StepForm>,
}

// ── Responses ──────────────────────────────────────────────────────

/// One row of the server table.
#[derive(Debug, Serialize)]
pub struct ServerRow {
    #[serde(flatten)]
    pub server: Server,
    pub status_label: String,
    pub row_status: RowStatus,
    pub ip_groups: BTreeMap<String, IpGroup>,
    pub actions: Vec<ServerAction>,
}

impl From<Server> for ServerRow {
    fn from(server: Server) -> Self {
        Self {
            status_label: server.status.display_name(),
            row_status: server.status.row_status(),
            ip_groups: server.ip_groups(),
            actions: ServerAction::allowed_for(&server),
            server,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServerIndex {
    pub servers: Vec<ServerRow>,
    pub messages: Notices,
}

#[derive(Debug, Serialize)]
pub struct ServerDetail {
    #[serde(flatten)]
    pub row: ServerRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConsoleResponse {
    pub server_id: String,
    pub console_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServerList {
    pub servers: Vec<Server>,
}

#[derive(Debug, Serialize)]
pub struct KeyPairIndex {
    pub keypairs: Vec<KeyPair>,
    pub messages: Notices,
}

#[derive(Debug, Serialize)]
pub struct KeyPairDownload {
    pub keypair_name: String,
    pub generate_url: String,
    pub regenerate_url: String,
}
