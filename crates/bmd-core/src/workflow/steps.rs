//! The five launch steps: what each renders, validates, and contributes.

use serde::Serialize;
use serde_json::Value;

use super::WorkflowContext;
use super::form::{
    Choice, Field, FieldErrors, FieldKind, FieldValue, REQUIRED, StepSubmission, invalid_choice,
};
use super::script;
use crate::notice::Notices;
use crate::types::{Flavor, Image, KeyPair, Network};
use crate::{Backends, Identity};

pub const NAME_MAX_LEN: usize = 255;

/// Where the key pair field sends users to import a key without leaving the
/// launch flow.
pub const KEYPAIR_IMPORT_URL: &str = "/project/server_key_pairs/import";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    ProjectUser,
    Details,
    AccessSecurity,
    Networking,
    PostCreation,
}

/// Static description of one step.
#[derive(Debug, Clone, Copy)]
pub struct StepDescriptor {
    pub kind: StepKind,
    pub slug: &'static str,
    pub name: &'static str,
    pub help_text: Option<&'static str>,
    /// Executed for its contributions but never shown.
    pub hidden: bool,
    /// Context keys that must be present before this step renders or validates.
    pub depends_on: &'static [&'static str],
    pub contributes: &'static [&'static str],
}

pub static LAUNCH_STEPS: [StepDescriptor; 5] = [
    StepDescriptor {
        kind: StepKind::ProjectUser,
        slug: "project_user",
        name: "Project & User",
        help_text: None,
        hidden: true,
        depends_on: &[],
        contributes: &["project_id", "user_id"],
    },
    StepDescriptor {
        kind: StepKind::Details,
        slug: "details",
        name: "Details",
        help_text: None,
        hidden: false,
        depends_on: &["project_id", "user_id"],
        contributes: &["availability_zone", "name", "count", "flavor", "image_id"],
    },
    StepDescriptor {
        kind: StepKind::AccessSecurity,
        slug: "access_security",
        name: "Access & Security",
        help_text: Some(
            "Control access to your server via key pairs, security groups, and other mechanisms.",
        ),
        hidden: false,
        depends_on: &["project_id", "user_id"],
        contributes: &["keypair_id"],
    },
    StepDescriptor {
        kind: StepKind::Networking,
        slug: "networking",
        name: "Networking",
        help_text: Some("Select networks for your server."),
        hidden: false,
        depends_on: &[],
        contributes: &["network_id"],
    },
    StepDescriptor {
        kind: StepKind::PostCreation,
        slug: "post_creation",
        name: "Post-Creation",
        help_text: None,
        hidden: false,
        depends_on: &[],
        contributes: &["script_data"],
    },
];

pub fn find(slug: &str) -> Option<&'static StepDescriptor> {
    LAUNCH_STEPS.iter().find(|s| s.slug == slug)
}

pub(crate) type Contribution = Vec<(&'static str, Value)>;

const SCRIPT_HELP: &str =
    "A script or set of commands to be executed after the server has been built (max 16kb).";

// ── Choice lists ─────────────────────────────────────────────────────

pub fn flavor_choices(mut flavors: Vec<Flavor>) -> Vec<Choice> {
    flavors.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    let mut choices: Vec<Choice> = flavors
        .into_iter()
        .map(|f| Choice::new(f.id, f.name))
        .collect();
    if choices.is_empty() {
        choices.push(Choice::new("", "No flavors found"));
    } else if choices.len() > 1 {
        choices.insert(0, Choice::new("", "Select Flavor"));
    }
    choices
}

pub fn zone_choices(mut zones: Vec<String>) -> Vec<Choice> {
    zones.sort();
    let mut choices: Vec<Choice> = zones.into_iter().map(|z| Choice::new(z.clone(), z)).collect();
    if choices.is_empty() {
        choices.push(Choice::new("", "No availability zones found"));
    } else if choices.len() > 1 {
        choices.insert(0, Choice::new("", "Any Availability Zone"));
    }
    choices
}

pub fn image_choices(images: Vec<Image>) -> Vec<Choice> {
    let mut bootable: Vec<Image> = images.into_iter().filter(|i| !i.is_snapshot).collect();
    bootable.sort_by(|a, b| a.name.as_deref().unwrap_or("").cmp(b.name.as_deref().unwrap_or("")));

    let mut choices: Vec<Choice> = bootable
        .iter()
        .map(|i| Choice::new(i.id.clone(), i.label()))
        .collect();
    if choices.is_empty() {
        choices.push(Choice::new("", "No images available"));
    } else {
        choices.insert(0, Choice::new("", "Select Image"));
    }
    choices
}

pub fn keypair_choices(keypairs: Vec<KeyPair>) -> Vec<Choice> {
    let mut names: Vec<String> = keypairs.into_iter().map(|kp| kp.name).collect();
    names.sort();
    if names.is_empty() {
        return vec![Choice::new("", "No key pairs available")];
    }
    let mut choices = vec![Choice::new("", "Select a key pair")];
    choices.extend(names.into_iter().map(|n| Choice::new(n.clone(), n)));
    choices
}

pub fn network_choices(mut networks: Vec<Network>) -> Vec<Choice> {
    networks.sort_by(|a, b| a.name.cmp(&b.name));
    networks
        .into_iter()
        .map(|n| Choice::new(n.id, n.name))
        .collect()
}

/// The only real choice, when exactly one exists besides placeholders.
fn sole_choice(choices: &[Choice]) -> Option<FieldValue> {
    let mut real = choices.iter().filter(|c| !c.value.is_empty());
    match (real.next(), real.next()) {
        (Some(only), None) => Some(FieldValue::One(only.value.clone())),
        _ => None,
    }
}

fn context_value(ctx: &WorkflowContext, key: &str) -> Option<FieldValue> {
    match ctx.get(key)? {
        Value::String(s) => Some(FieldValue::One(s.clone())),
        Value::Number(n) => Some(FieldValue::One(n.to_string())),
        Value::Array(items) => Some(FieldValue::Many(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )),
        _ => None,
    }
}

// ── Rendering ────────────────────────────────────────────────────────

/// Build the inputs of `step`, fetching reference data as needed.
///
/// A failed fetch degrades the affected field to its placeholder and adds a
/// notice; it never fails the render.
pub(crate) async fn render(
    step: &StepDescriptor,
    ctx: &WorkflowContext,
    backends: &Backends,
    identity: &Identity,
    notices: &mut Notices,
) -> Vec<Field> {
    match step.kind {
        StepKind::ProjectUser => {
            let project_label = identity.project_name.clone().unwrap_or_else(|| identity.project_id.clone());
            let user_label = identity.user_name.clone().unwrap_or_else(|| identity.user_id.clone());
            vec![
                Field::new("project_id", "Project", FieldKind::Choice)
                    .choices(vec![Choice::new(identity.project_id.clone(), project_label)])
                    .initial(context_value(ctx, "project_id")),
                Field::new("user_id", "User", FieldKind::Choice)
                    .choices(vec![Choice::new(identity.user_id.clone(), user_label)])
                    .initial(context_value(ctx, "user_id")),
            ]
        }
        StepKind::Details => {
            let project_id = ctx.get_str("project_id").unwrap_or(&identity.project_id);

            let zones = match backends.compute.list_availability_zones().await {
                Ok(zones) => zones,
                Err(e) => {
                    notices.handle(&e, "Unable to retrieve availability zones.");
                    Vec::new()
                }
            };
            let flavors = match backends.compute.list_flavors().await {
                Ok(flavors) => flavors,
                Err(e) => {
                    notices.handle(&e, "Unable to retrieve flavors.");
                    Vec::new()
                }
            };
            let images = match backends.images.available_images(project_id).await {
                Ok(images) => images,
                Err(e) => {
                    notices.handle(&e, "Unable to retrieve images.");
                    Vec::new()
                }
            };

            let count = context_value(ctx, "count").unwrap_or(FieldValue::One("1".into()));
            vec![
                Field::new("availability_zone", "Availability Zone", FieldKind::Choice)
                    .optional()
                    .choices(zone_choices(zones))
                    .initial(context_value(ctx, "availability_zone")),
                Field::new("name", "Server Name", FieldKind::Text)
                    .initial(context_value(ctx, "name")),
                Field::new("flavor", "Flavor", FieldKind::Choice)
                    .choices(flavor_choices(flavors))
                    .initial(context_value(ctx, "flavor"))
                    .help("Size of image to launch."),
                Field::new("count", "Number of Servers", FieldKind::Integer).initial(Some(count)),
                Field::new("image_id", "Image Name", FieldKind::Choice)
                    .choices(image_choices(images))
                    .initial(context_value(ctx, "image_id")),
            ]
        }
        StepKind::AccessSecurity => {
            let keypairs = match backends.compute.list_keypairs().await {
                Ok(keypairs) => keypairs,
                Err(e) => {
                    notices.handle(&e, "Unable to retrieve key pairs.");
                    Vec::new()
                }
            };
            let choices = keypair_choices(keypairs);
            let initial = context_value(ctx, "keypair_id").or_else(|| sole_choice(&choices));
            vec![
                Field::new("keypair", "Key Pair", FieldKind::Choice)
                    .choices(choices)
                    .initial(initial)
                    .help("Key pair to use for authentication.")
                    .add_item(KEYPAIR_IMPORT_URL),
            ]
        }
        StepKind::Networking => {
            let project_id = ctx.get_str("project_id").unwrap_or(&identity.project_id);
            let networks = match backends.networks.project_networks(project_id).await {
                Ok(networks) => networks,
                Err(e) => {
                    notices.handle(&e, "Unable to retrieve networks.");
                    Vec::new()
                }
            };
            let choices = network_choices(networks);
            let initial = context_value(ctx, "network_id").or_else(|| {
                sole_choice(&choices).map(|v| FieldValue::Many(v.all()))
            });
            vec![
                Field::new("network", "Networks", FieldKind::MultipleChoice)
                    .choices(choices)
                    .initial(initial)
                    .help("Launch server with these networks"),
            ]
        }
        StepKind::PostCreation => vec![
            Field::new("script_source", "Customization Script Source", FieldKind::Choice)
                .optional()
                .choices(vec![
                    Choice::new("", "Select Script Source"),
                    Choice::new("raw", "Direct Input"),
                    Choice::new("file", "File"),
                ]),
            Field::new("script_upload", "Script File", FieldKind::File)
                .optional()
                .help(SCRIPT_HELP),
            Field::new("script_data", "Script Data", FieldKind::Textarea)
                .optional()
                .initial(context_value(ctx, "script_data"))
                .help(SCRIPT_HELP),
        ],
    }
}

// ── Validation ───────────────────────────────────────────────────────

fn field<'f>(fields: &'f [Field], name: &str) -> Option<&'f Field> {
    fields.iter().find(|f| f.name == name)
}

/// Check a single-choice value against the freshly rendered choices.
fn check_choice(
    fields: &[Field],
    name: &str,
    value: Option<&str>,
    errors: &mut FieldErrors,
) -> Option<String> {
    let value = value?;
    match field(fields, name) {
        Some(f) if f.offers(value) => Some(value.to_string()),
        _ => {
            errors.add(name, invalid_choice(value));
            None
        }
    }
}

/// Validate the submitted inputs of `step` against its rendered `fields`.
pub(crate) fn validate(
    step: &StepDescriptor,
    fields: &[Field],
    submission: &StepSubmission,
    identity: &Identity,
) -> Result<Contribution, FieldErrors> {
    let mut errors = FieldErrors::default();

    let contribution = match step.kind {
        // Always valid: the acting project and user come from the identity.
        StepKind::ProjectUser => vec![
            ("project_id", Value::from(identity.project_id.clone())),
            ("user_id", Value::from(identity.user_id.clone())),
        ],
        StepKind::Details => {
            let zone = check_choice(fields, "availability_zone", submission.value("availability_zone"), &mut errors)
                .unwrap_or_default();

            let name = match submission.value("name") {
                None => {
                    errors.add("name", REQUIRED);
                    None
                }
                Some(name) if name.chars().count() > NAME_MAX_LEN => {
                    errors.add(
                        "name",
                        format!(
                            "Ensure this value has at most {NAME_MAX_LEN} characters (it has {}).",
                            name.chars().count()
                        ),
                    );
                    None
                }
                Some(name) => Some(name.to_string()),
            };

            let count = match submission.value("count") {
                None => Some(1),
                Some(raw) => match raw.parse::<i64>() {
                    Err(_) => {
                        errors.add("count", "Enter a whole number.");
                        None
                    }
                    Ok(n) if n < 1 => {
                        errors.add("count", "Ensure this value is greater than or equal to 1.");
                        None
                    }
                    Ok(n) => match u32::try_from(n) {
                        Ok(n) => Some(n),
                        Err(_) => {
                            errors.add("count", "Enter a whole number.");
                            None
                        }
                    },
                },
            };

            let flavor = match submission.value("flavor") {
                None => {
                    errors.add("flavor", REQUIRED);
                    None
                }
                value => check_choice(fields, "flavor", value, &mut errors),
            };

            let image = match submission.value("image_id") {
                None => {
                    errors.add("image_id", "You must select an image.");
                    None
                }
                value => check_choice(fields, "image_id", value, &mut errors),
            };

            match (name, count, flavor, image) {
                (Some(name), Some(count), Some(flavor), Some(image)) if errors.is_empty() => vec![
                    ("availability_zone", Value::from(zone)),
                    ("name", Value::from(name)),
                    ("count", Value::from(count)),
                    ("flavor", Value::from(flavor)),
                    ("image_id", Value::from(image)),
                ],
                _ => return Err(errors),
            }
        }
        StepKind::AccessSecurity => match submission.value("keypair") {
            None => {
                errors.add("keypair", REQUIRED);
                return Err(errors);
            }
            value => match check_choice(fields, "keypair", value, &mut errors) {
                Some(keypair) => vec![("keypair_id", Value::from(keypair))],
                None => return Err(errors),
            },
        },
        StepKind::Networking => {
            // An unchecked form posts a single empty entry; drop it.
            let networks: Vec<String> = submission
                .values("network")
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
            if networks.is_empty() {
                errors.add("network", "At least one network must be specified.");
                return Err(errors);
            }

            let offered = field(fields, "network");
            for net in &networks {
                if !offered.is_some_and(|f| f.offers(net)) {
                    errors.add("network", invalid_choice(net));
                }
            }
            if !errors.is_empty() {
                return Err(errors);
            }
            vec![("network_id", Value::from(networks))]
        }
        StepKind::PostCreation => {
            let script = match submission.files.get("script_upload") {
                Some(file) => match script::read_upload(file) {
                    Ok(script) => script,
                    Err(msg) => {
                        errors.add_non_field(msg);
                        return Err(errors);
                    }
                },
                None => submission
                    .fields
                    .get("script_data")
                    .and_then(FieldValue::first)
                    .unwrap_or_default()
                    .to_string(),
            };
            vec![("script_data", Value::from(script))]
        }
    };

    Ok(contribution)
}
