use planos_core::domain::request::RequestStatus;
use planos_db::repositories::{RequestRepository, SqlRequestRepository};
use planos_db::{connect, migrations};

use crate::commands::{build_runtime, fetch_request, load_config, CommandFailure, CommandResult};

pub fn run(request_id: Option<&str>, filter: Option<&str>) -> CommandResult {
    let config = match load_config("status") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let filter = match filter.map(parse_status).transpose() {
        Ok(filter) => filter,
        Err(value) => {
            return CommandResult::failure(
                "status",
                "bad_filter",
                format!("unknown status filter `{value}` (expected pendiente|en_revision|aprobado|rechazado)"),
                2,
            );
        }
    };

    let runtime = match build_runtime("status") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let repo = SqlRequestRepository::new(pool.clone());
        let message = match request_id {
            Some(request_id) => {
                let request = fetch_request(&repo, request_id).await?;
                serde_json::to_string_pretty(&request)
                    .map_err(|error| ("serialization", error.to_string(), 5u8))?
            }
            None => {
                let requests = repo
                    .list_by_status(filter)
                    .await
                    .map_err(|error| ("persistence", error.to_string(), 5u8))?;
                if requests.is_empty() {
                    "no requests found".to_string()
                } else {
                    requests
                        .iter()
                        .map(|request| {
                            format!(
                                "{} [{}] {}",
                                request.id,
                                request.status.as_str(),
                                request.event_name
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
        };

        pool.close().await;
        Ok::<_, CommandFailure>(message)
    });

    match result {
        Ok(message) => CommandResult::success("status", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("status", error_class, message, exit_code)
        }
    }
}

fn parse_status(value: &str) -> Result<RequestStatus, String> {
    match value {
        "pendiente" => Ok(RequestStatus::Pendiente),
        "en_revision" => Ok(RequestStatus::EnRevision),
        "aprobado" => Ok(RequestStatus::Aprobado),
        "rechazado" => Ok(RequestStatus::Rechazado),
        other => Err(other.to_string()),
    }
}
