//! Post-boot customization scripts.

use super::form::UploadedFile;

/// Largest accepted uploaded script, in bytes.
pub const MAX_SCRIPT_BYTES: usize = 16 * 1024;

pub const TOO_LARGE: &str = "File exceeds maximum size (16kb)";

/// Read an uploaded script, enforcing the size cap and text encoding.
pub fn read_upload(file: &UploadedFile) -> Result<String, String> {
    tracing::info!(filename = %file.filename, bytes = file.content.len(), "got script upload");

    if file.content.len() > MAX_SCRIPT_BYTES {
        return Err(TOO_LARGE.to_string());
    }
    String::from_utf8(file.content.clone())
        .map_err(|e| format!("There was a problem parsing the script: {e}"))
}

/// Convert `\r\n` and lone `\r` line endings to `\n`.
pub fn normalize_newlines(script: &str) -> String {
    script.replace("\r\n", "\n").replace('\r', "\n")
}
