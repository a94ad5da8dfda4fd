use chrono::Utc;
use uuid::Uuid;

use planos_core::domain::request::PlanDocument;
use planos_core::errors::{ApplicationError, DomainError};
use planos_core::workflow::WorkflowEngine;
use planos_db::repositories::{RequestRepository, SqlRequestRepository};
use planos_db::{connect, migrations};

use crate::commands::{
    actor_from_args, build_runtime, fetch_request, load_config, CommandFailure, CommandResult,
};
use crate::ActorArgs;

pub fn run(
    request_id: &str,
    plan_name: &str,
    url: &str,
    size: u64,
    remove: bool,
    actor_args: &ActorArgs,
) -> CommandResult {
    let config = match load_config("upload") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let catalog = match config.group_catalog() {
        Ok(catalog) => catalog,
        Err(error) => {
            return CommandResult::failure(
                "upload",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match build_runtime("upload") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let actor = actor_from_args(actor_args);
    let correlation_id = Uuid::new_v4().to_string();

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let repo = SqlRequestRepository::new(pool.clone());
        let request = fetch_request(&repo, request_id).await?;

        let engine = WorkflowEngine::new(catalog);
        let now = Utc::now();
        let transition = if remove {
            engine.record_plan_removal(&request, &actor, plan_name, now)
        } else {
            let plan = PlanDocument {
                name: plan_name.to_string(),
                url: url.to_string(),
                size,
                uploaded_by: actor.user_id.clone(),
                uploaded_by_name: actor.display_name.clone(),
                uploaded_at: now,
            };
            engine.record_plan_upload(&request, &actor, plan, now)
        };

        let outcome = transition.map_err(|error| {
            let interface = ApplicationError::from(DomainError::Workflow(error.clone()))
                .into_interface(correlation_id.clone());
            ("workflow", format!("{} ({error})", interface.user_message()), 7u8)
        })?;

        repo.save(outcome.request.clone())
            .await
            .map_err(|error| ("persistence", error.to_string(), 5u8))?;

        pool.close().await;
        Ok::<_, CommandFailure>(outcome.request)
    });

    match result {
        Ok(request) => {
            let verb = if remove { "removed from" } else { "attached to" };
            CommandResult::success(
                "upload",
                format!(
                    "plan `{plan_name}` {verb} request {}; {} document(s) on file",
                    request.id,
                    request.plans.len()
                ),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("upload", error_class, message, exit_code)
        }
    }
}
