use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use planos_core::audit::{AuditContext, InMemoryAuditSink};
use planos_core::errors::{ApplicationError, DomainError};
use planos_core::workflow::WorkflowEngine;
use planos_db::repositories::{
    AuditEventRepository, RequestRepository, SqlAuditEventRepository, SqlRequestRepository,
};
use planos_db::{connect, migrations};
use planos_notify::{LoggingMailTransport, NotificationDispatcher};

use crate::commands::{
    actor_from_args, build_runtime, fetch_request, load_config, CommandFailure, CommandResult,
};
use crate::ActorArgs;

pub fn run(request_id: &str, reason: &str, actor_args: &ActorArgs) -> CommandResult {
    if reason.trim().is_empty() {
        return CommandResult::failure("reject", "bad_reason", "a rejection reason is required", 2);
    }

    let config = match load_config("reject") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let catalog = match config.group_catalog() {
        Ok(catalog) => catalog,
        Err(error) => {
            return CommandResult::failure(
                "reject",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match build_runtime("reject") {
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
        let audit_repo = SqlAuditEventRepository::new(pool.clone());
        let request = fetch_request(&repo, request_id).await?;

        let engine = WorkflowEngine::new(catalog);
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(correlation_id.clone(), actor.user_id.clone());

        let transition =
            engine.reject_with_audit(&request, &actor, reason, Utc::now(), &sink, &audit);
        for event in sink.events() {
            if let Err(error) = audit_repo.append(event).await {
                warn!(%correlation_id, %error, "audit event could not be persisted");
            }
        }
        let outcome = transition.map_err(|error| {
            let interface = ApplicationError::from(DomainError::Workflow(error.clone()))
                .into_interface(correlation_id.clone());
            ("workflow", format!("{} ({error})", interface.user_message()), 7u8)
        })?;

        repo.save(outcome.request.clone())
            .await
            .map_err(|error| ("persistence", error.to_string(), 5u8))?;

        let dispatcher = NotificationDispatcher::new(LoggingMailTransport);
        let report = dispatcher.dispatch(&outcome.notifications).await;

        pool.close().await;
        Ok::<_, CommandFailure>((outcome.request, report))
    });

    match result {
        Ok((request, report)) => {
            let mut message = format!(
                "request {} rejected by {}; returned to areas_sostenibilidad for document correction",
                request.id, actor.user_id
            );
            message.push_str(&format!("; notifications delivered: {}", report.delivered));
            if !report.all_delivered() {
                message.push_str(&format!(" ({} failed)", report.failures.len()));
            }
            CommandResult::success("reject", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("reject", error_class, message, exit_code)
        }
    }
}
