pub mod approve;
pub mod config;
pub mod migrate;
pub mod reject;
pub mod seed;
pub mod status;
pub mod upload;

use serde::Serialize;

use planos_core::config::{AppConfig, LoadOptions};
use planos_core::domain::actor::Actor;
use planos_core::domain::request::{Request, RequestId};
use planos_db::repositories::{RequestRepository, SqlRequestRepository};

use crate::ActorArgs;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Error class, message, and process exit code for a failed command step.
pub(crate) type CommandFailure = (&'static str, String, u8);

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

pub(crate) fn actor_from_args(args: &ActorArgs) -> Actor {
    Actor::new(args.user.clone(), args.name.clone(), args.email.clone(), args.roles.clone())
}

pub(crate) async fn fetch_request(
    repo: &SqlRequestRepository,
    request_id: &str,
) -> Result<Request, CommandFailure> {
    let id = RequestId(request_id.to_string());
    repo.find_by_id(&id)
        .await
        .map_err(|error| ("persistence", error.to_string(), 5u8))?
        .ok_or_else(|| ("not_found", format!("request `{id}` was not found"), 6u8))
}
