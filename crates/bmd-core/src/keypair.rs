//! Key pair form validation and download naming.

use unicode_normalization::UnicodeNormalization;

pub const NAME_MAX_LEN: usize = 255;

const NAME_CHARSET_MESSAGE: &str =
    "Key pair name may only contain letters, numbers, underscores, spaces, and hyphens.";

/// Validate a key pair name, returning the user-facing error on failure.
pub fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("This field is required.".into());
    }
    let len = name.chars().count();
    if len > NAME_MAX_LEN {
        return Err(format!(
            "Ensure this value has at most {NAME_MAX_LEN} characters (it has {len})."
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ' ')
    {
        return Err(NAME_CHARSET_MESSAGE.into());
    }
    Ok(())
}

/// Validate an imported public key.
pub fn validate_public_key(public_key: &str) -> Result<(), String> {
    if public_key.trim().is_empty() {
        return Err("This field is required.".into());
    }
    Ok(())
}

/// File-name slug for a key pair download: compatibility-decomposed and
/// folded to ASCII, lowercase, word characters kept, runs of whitespace and
/// hyphens collapsed to one `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    let kept = value
        .nfkd()
        .filter(|c| c.is_ascii())
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_ascii_whitespace())
        .collect::<String>();

    for c in kept.trim().chars() {
        if c == '-' || c.is_ascii_whitespace() {
            pending_dash = true;
            continue;
        }
        if pending_dash {
            slug.push('-');
        }
        pending_dash = false;
        slug.push(c.to_ascii_lowercase());
    }
    if pending_dash {
        slug.push('-');
    }
    slug
}
