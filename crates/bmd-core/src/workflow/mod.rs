//! The server launch wizard.
//!
//! A fixed, ordered list of steps (see [`steps::LAUNCH_STEPS`]) is driven by
//! an explicit loop. Each step renders its inputs from fresh reference data,
//! validates what the user posted, and contributes keys to a shared
//! [`WorkflowContext`]. When every step has passed, exactly one creation call
//! is issued. Nothing survives the attempt: the browser posts the context
//! back on every request.

pub mod form;
pub mod script;
pub mod steps;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notice::Notices;
use crate::types::{NicRequest, ServerCreate};
use crate::{Backends, Error, Identity, Result};
use form::{Field, FieldErrors, StepSubmission};
use steps::{LAUNCH_STEPS, StepDescriptor};

/// Keys contributed so far in one launch attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowContext(BTreeMap<String, Value>);

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        match self.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    fn merge(&mut self, contribution: steps::Contribution) {
        for (key, value) in contribution {
            self.0.insert(key.to_string(), value);
        }
    }
}

/// Where one launch attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchState {
    Initial,
    /// Rendering and validating the step at this 1-based position.
    Collecting(usize),
    /// All steps passed; checking the context is complete.
    Validating,
    Submitted,
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedStep {
    pub slug: &'static str,
    pub name: &'static str,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<&'static str>,
    pub fields: Vec<Field>,
}

impl RenderedStep {
    fn new(step: &StepDescriptor, fields: Vec<Field>) -> Self {
        Self {
            slug: step.slug,
            name: step.name,
            hidden: step.hidden,
            help_text: step.help_text,
            fields,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RenderedWorkflow {
    pub name: &'static str,
    pub finalize_button: &'static str,
    pub context: WorkflowContext,
    pub steps: Vec<RenderedStep>,
    pub messages: Notices,
}

/// Result of submitting a single step.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step's keys were merged into the returned context.
    Accepted {
        context: WorkflowContext,
        messages: Notices,
    },
    /// The step must be resupplied; earlier contributions are kept.
    Rejected {
        context: WorkflowContext,
        errors: FieldErrors,
        step: RenderedStep,
        messages: Notices,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LaunchOutcome {
    Submitted {
        message: String,
    },
    Rejected {
        step: &'static str,
        errors: FieldErrors,
        context: WorkflowContext,
    },
    /// The creation call itself failed. No retry is attempted.
    Failed {
        message: String,
    },
}

#[derive(Debug, Serialize)]
pub struct LaunchReport {
    /// `Submitted` once the creation call was issued, even if it failed.
    pub state: LaunchState,
    #[serde(flatten)]
    pub outcome: LaunchOutcome,
    pub messages: Notices,
}

impl LaunchReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, LaunchOutcome::Submitted { .. })
    }
}

const SUCCESS_MESSAGE: &str = "Request for launching {count} named \"{name}\" has been submitted.";
const FAILURE_MESSAGE: &str = "Unable to launch {count} named \"{name}\".";

/// Fill a status message template with the server name and a count phrase
/// ("server" or "N servers").
pub fn format_status_message(template: &str, ctx: &WorkflowContext) -> String {
    let name = ctx.get_str("name").unwrap_or("unknown server");
    let count = ctx.get_u32("count").unwrap_or(1);
    let count = if count > 1 {
        format!("{count} servers")
    } else {
        "server".to_string()
    };
    template.replace("{count}", &count).replace("{name}", name)
}

/// Compose the single creation request from a completed context.
pub fn build_request(ctx: &WorkflowContext) -> Result<ServerCreate> {
    let name = ctx.get_str("name").ok_or(Error::MissingContext("name"))?;
    let image_id = ctx.get_str("image_id").ok_or(Error::MissingContext("image_id"))?;
    let flavor_id = ctx.get_str("flavor").ok_or(Error::MissingContext("flavor"))?;
    let count = ctx.get_u32("count").ok_or(Error::MissingContext("count"))?;

    let networks = ctx.get_list("network_id");
    let nics = if networks.is_empty() {
        None
    } else {
        Some(
            networks
                .into_iter()
                .map(|net_id| NicRequest {
                    net_id,
                    v4_fixed_ip: String::new(),
                })
                .collect(),
        )
    };

    let script = script::normalize_newlines(ctx.get_str("script_data").unwrap_or_default());

    Ok(ServerCreate {
        name: name.to_string(),
        image_id: image_id.to_string(),
        flavor_id: flavor_id.to_string(),
        nics,
        availability_zone: ctx
            .get_str("availability_zone")
            .filter(|z| !z.is_empty())
            .map(str::to_string),
        user_data: Some(script).filter(|s| !s.is_empty()),
        key_name: ctx
            .get_str("keypair_id")
            .filter(|k| !k.is_empty())
            .map(str::to_string),
        min_count: count,
        max_count: count,
    })
}

/// The launch wizard for one caller.
pub struct LaunchWorkflow<'a> {
    backends: &'a Backends,
    identity: &'a Identity,
}

impl<'a> LaunchWorkflow<'a> {
    pub const NAME: &'static str = "Launch Server";
    pub const FINALIZE_BUTTON: &'static str = "Launch";

    pub fn new(backends: &'a Backends, identity: &'a Identity) -> Self {
        Self { backends, identity }
    }

    pub fn steps() -> &'static [StepDescriptor] {
        &LAUNCH_STEPS
    }

    /// Context seeded from the caller's identity.
    pub fn initial_context(&self) -> WorkflowContext {
        let mut ctx = WorkflowContext::new();
        for (key, value) in self.identity_keys() {
            ctx.insert(key, value);
        }
        ctx
    }

    fn identity_keys(&self) -> [(&'static str, String); 2] {
        [
            ("project_id", self.identity.project_id.clone()),
            ("user_id", self.identity.user_id.clone()),
        ]
    }

    /// Replace identity keys echoed back by the browser with the caller's own.
    fn pin_identity(&self, ctx: &mut WorkflowContext) {
        for (key, value) in self.identity_keys() {
            if ctx.contains(key) {
                ctx.insert(key, value);
            }
        }
    }

    fn check_dependencies(step: &StepDescriptor, ctx: &WorkflowContext) -> Result<()> {
        match step.depends_on.iter().find(|key| !ctx.contains(key)) {
            Some(key) => Err(Error::MissingContext(*key)),
            None => Ok(()),
        }
    }

    /// Render every step against `ctx`. Fetch failures become messages.
    pub async fn render(&self, ctx: Option<WorkflowContext>) -> RenderedWorkflow {
        let mut ctx = ctx.unwrap_or_default();
        for (key, value) in self.identity_keys() {
            ctx.insert(key, value);
        }

        let mut messages = Notices::new();
        let mut rendered = Vec::with_capacity(LAUNCH_STEPS.len());
        for step in &LAUNCH_STEPS {
            let fields = steps::render(step, &ctx, self.backends, self.identity, &mut messages).await;
            rendered.push(RenderedStep::new(step, fields));
        }

        RenderedWorkflow {
            name: Self::NAME,
            finalize_button: Self::FINALIZE_BUTTON,
            context: ctx,
            steps: rendered,
            messages,
        }
    }

    /// Validate one step's inputs and fold its contribution into `ctx`.
    pub async fn submit_step(
        &self,
        slug: &str,
        mut ctx: WorkflowContext,
        submission: &StepSubmission,
    ) -> Result<StepOutcome> {
        let step = steps::find(slug).ok_or_else(|| Error::UnknownStep(slug.to_string()))?;
        self.pin_identity(&mut ctx);
        Self::check_dependencies(step, &ctx)?;

        let mut messages = Notices::new();
        let fields = steps::render(step, &ctx, self.backends, self.identity, &mut messages).await;

        Ok(match steps::validate(step, &fields, submission, self.identity) {
            Ok(contribution) => {
                ctx.merge(contribution);
                StepOutcome::Accepted {
                    context: ctx,
                    messages,
                }
            }
            Err(errors) => StepOutcome::Rejected {
                context: ctx,
                errors,
                step: RenderedStep::new(step, fields),
                messages,
            },
        })
    }

    /// Run every step in order over `submissions` (keyed by step slug) and,
    /// if all pass, issue the creation call exactly once.
    pub async fn submit(&self, submissions: &BTreeMap<String, StepSubmission>) -> LaunchReport {
        let mut state = LaunchState::Initial;
        let mut ctx = self.initial_context();
        let mut messages = Notices::new();
        let empty = StepSubmission::default();

        for (index, step) in LAUNCH_STEPS.iter().enumerate() {
            state = transition(state, LaunchState::Collecting(index + 1));

            if let Err(e) = Self::check_dependencies(step, &ctx) {
                let mut errors = FieldErrors::default();
                errors.add_non_field(e.to_string());
                return rejected(state, step.slug, errors, ctx, messages);
            }

            let submission = submissions.get(step.slug).unwrap_or(&empty);
            let fields = steps::render(step, &ctx, self.backends, self.identity, &mut messages).await;

            match steps::validate(step, &fields, submission, self.identity) {
                Ok(contribution) => ctx.merge(contribution),
                Err(errors) => return rejected(state, step.slug, errors, ctx, messages),
            }
        }

        state = transition(state, LaunchState::Validating);
        let request = match build_request(&ctx) {
            Ok(request) => request,
            Err(e) => {
                let mut errors = FieldErrors::default();
                errors.add_non_field(e.to_string());
                let last = LAUNCH_STEPS[LAUNCH_STEPS.len() - 1].slug;
                return rejected(state, last, errors, ctx, messages);
            }
        };

        let state = transition(state, LaunchState::Submitted);
        let outcome = self.handle(&ctx, &request, &mut messages).await;
        LaunchReport {
            state,
            outcome,
            messages,
        }
    }

    /// Issue the creation call. Never logs the context; it carries the
    /// user-data script.
    async fn handle(
        &self,
        ctx: &WorkflowContext,
        request: &ServerCreate,
        messages: &mut Notices,
    ) -> LaunchOutcome {
        match self.backends.compute.create_server(request).await {
            Ok(_) => {
                let message = format_status_message(SUCCESS_MESSAGE, ctx);
                tracing::info!(name = %request.name, count = request.max_count, "launch submitted");
                messages.success(message.clone());
                LaunchOutcome::Submitted { message }
            }
            Err(e) => {
                let message = format_status_message(FAILURE_MESSAGE, ctx);
                messages.handle(&e, message.clone());
                LaunchOutcome::Failed { message }
            }
        }
    }
}

fn transition(from: LaunchState, to: LaunchState) -> LaunchState {
    tracing::debug!(?from, ?to, "launch workflow transition");
    to
}

fn rejected(
    state: LaunchState,
    step: &'static str,
    errors: FieldErrors,
    context: WorkflowContext,
    messages: Notices,
) -> LaunchReport {
    LaunchReport {
        state: transition(state, LaunchState::Rejected),
        outcome: LaunchOutcome::Rejected {
            step,
            errors,
            context,
        },
        messages,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fake::{FakeCatalog, FakeCompute, identity};
    use crate::types::{Flavor, Image, Network};

    fn backends(compute: Arc<FakeCompute>, catalog: Arc<FakeCatalog>) -> Backends {
        Backends {
            compute,
            images: catalog.clone(),
            networks: catalog,
        }
    }

    fn seeded() -> (Arc<FakeCompute>, Arc<FakeCatalog>) {
        let compute = Arc::new(FakeCompute::default());
        compute.add_flavor(Flavor {
            id: "flv-1".into(),
            name: "baremetal-small".into(),
            description: None,
        });
        compute.add_flavor(Flavor {
            id: "flv-2".into(),
            name: "baremetal-large".into(),
            description: None,
        });
        compute.set_zones(vec!["az1".into()]);
        compute.add_keypair("kp1");

        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_image(Image {
            id: "img-1".into(),
            name: Some("ubuntu".into()),
            is_snapshot: false,
            size_bytes: None,
            min_disk_gb: 0,
        });
        for (id, name) in [("net-1", "private"), ("net-A", "alpha")] {
            catalog.add_network(Network {
                id: id.into(),
                name: name.into(),
            });
        }
        (compute, catalog)
    }

    fn details() -> StepSubmission {
        StepSubmission::new()
            .field("name", "web01")
            .field("count", "3")
            .field("flavor", "flv-1")
            .field("image_id", "img-1")
    }

    #[tokio::test]
    async fn end_to_end_launch_issues_one_create() {
        let (compute, catalog) = seeded();
        let backends = backends(compute.clone(), catalog);
        let who = identity();
        let workflow = LaunchWorkflow::new(&backends, &who);

        let mut submissions = BTreeMap::new();
        submissions.insert("details".to_string(), details());
        submissions.insert(
            "access_security".to_string(),
            StepSubmission::new().field("keypair", "kp1"),
        );
        submissions.insert(
            "networking".to_string(),
            StepSubmission::new().list("network", &["net-1"]),
        );

        let report = workflow.submit(&submissions).await;
        assert!(report.succeeded(), "{report:?}");
        assert_eq!(report.state, LaunchState::Submitted);
        match &report.outcome {
            LaunchOutcome::Submitted { message } => assert_eq!(
                message,
                "Request for launching 3 servers named \"web01\" has been submitted."
            ),
            other => panic!("unexpected outcome {other:?}"),
        }

        let creates = compute.created();
        assert_eq!(creates.len(), 1);
        let req = &creates[0];
        assert_eq!(req.min_count, 3);
        assert_eq!(req.max_count, 3);
        assert_eq!(req.key_name.as_deref(), Some("kp1"));
        assert_eq!(req.availability_zone, None);
        assert_eq!(req.user_data, None);
        assert_eq!(
            serde_json::to_value(&req.nics).unwrap(),
            serde_json::json!([{"net-id": "net-1", "v4-fixed-ip": ""}])
        );
    }

    #[tokio::test]
    async fn missing_image_rejects_details_step() {
        let (compute, catalog) = seeded();
        let backends = backends(compute.clone(), catalog);
        let who = identity();
        let workflow = LaunchWorkflow::new(&backends, &who);

        let submission = StepSubmission::new()
            .field("name", "web01")
            .field("flavor", "flv-1");
        let ctx = workflow.initial_context();
        let outcome = workflow.submit_step("details", ctx.clone(), &submission).await.unwrap();

        match outcome {
            StepOutcome::Rejected { context, errors, .. } => {
                assert_eq!(errors.get("image_id").unwrap(), ["You must select an image."]);
                assert_eq!(context, ctx);
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        let mut submissions = BTreeMap::new();
        submissions.insert("details".to_string(), submission);
        let report = workflow.submit(&submissions).await;
        assert!(matches!(report.outcome, LaunchOutcome::Rejected { step: "details", .. }));
        assert_eq!(report.state, LaunchState::Rejected);
        assert!(compute.created().is_empty());
    }

    #[tokio::test]
    async fn blank_network_entries_are_dropped() {
        let (compute, catalog) = seeded();
        let backends = backends(compute, catalog);
        let who = identity();
        let workflow = LaunchWorkflow::new(&backends, &who);

        let outcome = workflow
            .submit_step(
                "networking",
                workflow.initial_context(),
                &StepSubmission::new().list("network", &["", "net-A"]),
            )
            .await
            .unwrap();

        match outcome {
            StepOutcome::Accepted { context, .. } => {
                assert_eq!(context.get_list("network_id"), vec!["net-A"]);
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn networking_requires_a_selection() {
        let (compute, catalog) = seeded();
        let backends = backends(compute, catalog);
        let who = identity();
        let workflow = LaunchWorkflow::new(&backends, &who);

        let outcome = workflow
            .submit_step(
                "networking",
                workflow.initial_context(),
                &StepSubmission::new().list("network", &[""]),
            )
            .await
            .unwrap();
        match outcome {
            StepOutcome::Rejected { errors, .. } => assert_eq!(
                errors.get("network").unwrap(),
                ["At least one network must be specified."]
            ),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_script_upload_fails_validation() {
        let (compute, catalog) = seeded();
        let backends = backends(compute, catalog);
        let who = identity();
        let workflow = LaunchWorkflow::new(&backends, &who);

        let submission =
            StepSubmission::new().file("script_upload", "big.sh", vec![b'#'; 16 * 1024 + 1]);
        let outcome = workflow
            .submit_step("post_creation", workflow.initial_context(), &submission)
            .await
            .unwrap();
        match outcome {
            StepOutcome::Rejected { errors, .. } => {
                assert_eq!(errors.non_field, vec!["File exceeds maximum size (16kb)"]);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn uploaded_script_is_normalized_in_request() {
        let (compute, catalog) = seeded();
        let backends = backends(compute.clone(), catalog);
        let who = identity();
        let workflow = LaunchWorkflow::new(&backends, &who);

        let mut submissions = BTreeMap::new();
        submissions.insert("details".to_string(), details().field("count", "1"));
        submissions.insert(
            "access_security".to_string(),
            StepSubmission::new().field("keypair", "kp1"),
        );
        submissions.insert(
            "networking".to_string(),
            StepSubmission::new().list("network", &["net-1", "net-A"]),
        );
        submissions.insert(
            "post_creation".to_string(),
            StepSubmission::new()
                .field("script_data", "ignored")
                .file("script_upload", "init.sh", b"#!/bin/sh\r\necho hi\r\n".to_vec()),
        );

        let report = workflow.submit(&submissions).await;
        match &report.outcome {
            LaunchOutcome::Submitted { message } => assert_eq!(
                message,
                "Request for launching server named \"web01\" has been submitted."
            ),
            other => panic!("unexpected outcome {other:?}"),
        }
        let req = &compute.created()[0];
        assert_eq!(req.user_data.as_deref(), Some("#!/bin/sh\necho hi\n"));
        assert_eq!(req.nics.as_ref().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn flavor_outage_degrades_choices_with_message() {
        let (compute, catalog) = seeded();
        compute.fail_flavors();
        let backends = backends(compute, catalog);
        let who = identity();
        let workflow = LaunchWorkflow::new(&backends, &who);

        let rendered = workflow.render(None).await;
        let details = rendered.steps.iter().find(|s| s.slug == "details").unwrap();
        let flavor = details.fields.iter().find(|f| f.name == "flavor").unwrap();
        assert_eq!(flavor.choices, vec![form::Choice::new("", "No flavors found")]);

        let messages: Vec<_> = rendered.messages.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["Unable to retrieve flavors."]);
        assert_eq!(rendered.context.get_str("project_id"), Some("proj-1"));
    }

    #[tokio::test]
    async fn sole_network_is_preselected() {
        let compute = Arc::new(FakeCompute::default());
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_network(Network {
            id: "net-1".into(),
            name: "private".into(),
        });
        let backends = backends(compute, catalog);
        let who = identity();
        let workflow = LaunchWorkflow::new(&backends, &who);

        let rendered = workflow.render(None).await;
        let networking = rendered.steps.iter().find(|s| s.slug == "networking").unwrap();
        assert_eq!(
            networking.fields[0].initial,
            Some(form::FieldValue::Many(vec!["net-1".into()]))
        );
    }

    #[tokio::test]
    async fn downstream_failure_is_reported_once() {
        let (compute, catalog) = seeded();
        compute.fail_creates();
        let backends = backends(compute.clone(), catalog);
        let who = identity();
        let workflow = LaunchWorkflow::new(&backends, &who);

        let mut submissions = BTreeMap::new();
        submissions.insert("details".to_string(), details());
        submissions.insert(
            "access_security".to_string(),
            StepSubmission::new().field("keypair", "kp1"),
        );
        submissions.insert(
            "networking".to_string(),
            StepSubmission::new().list("network", &["net-1"]),
        );

        let report = workflow.submit(&submissions).await;
        match &report.outcome {
            LaunchOutcome::Failed { message } => {
                assert_eq!(message, "Unable to launch 3 servers named \"web01\".")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(compute.create_attempts(), 1);
        assert_eq!(report.state, LaunchState::Submitted);
    }

    #[tokio::test]
    async fn echoed_identity_is_replaced_by_caller() {
        let (compute, catalog) = seeded();
        let backends = backends(compute, catalog);
        let who = identity();
        let workflow = LaunchWorkflow::new(&backends, &who);

        let mut spoofed = WorkflowContext::new();
        spoofed.insert("project_id", "proj-other");
        spoofed.insert("user_id", "user-other");

        let rendered = workflow.render(Some(spoofed.clone())).await;
        assert_eq!(rendered.context.get_str("project_id"), Some("proj-1"));
        assert_eq!(rendered.context.get_str("user_id"), Some("user-1"));

        let outcome = workflow
            .submit_step(
                "access_security",
                spoofed,
                &StepSubmission::new().field("keypair", "kp1"),
            )
            .await
            .unwrap();
        match outcome {
            StepOutcome::Accepted { context, .. } => {
                assert_eq!(context.get_str("project_id"), Some("proj-1"));
                assert_eq!(context.get_str("user_id"), Some("user-1"));
                assert_eq!(context.get_str("keypair_id"), Some("kp1"));
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dependent_step_needs_project_and_user() {
        let (compute, catalog) = seeded();
        let backends = backends(compute, catalog);
        let who = identity();
        let workflow = LaunchWorkflow::new(&backends, &who);

        let err = workflow
            .submit_step("details", WorkflowContext::new(), &details())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingContext("project_id")));
    }

    #[test]
    fn single_server_message_is_singular() {
        let mut ctx = WorkflowContext::new();
        ctx.insert("name", "db01");
        ctx.insert("count", 1);
        assert_eq!(
            format_status_message(FAILURE_MESSAGE, &ctx),
            "Unable to launch server named \"db01\"."
        );
    }
}
