use planos_db::{connect, migrations, seed_demo_requests};

use crate::commands::{build_runtime, load_config, CommandFailure, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match build_runtime("seed") {
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

        let summary = seed_demo_requests(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        pool.close().await;
        Ok::<_, CommandFailure>(summary)
    });

    match result {
        Ok(summary) => {
            let mut lines = vec![format!(
                "demo requests loaded: {} created, {} already present",
                summary.created.len(),
                summary.skipped.len()
            )];
            for id in &summary.created {
                lines.push(format!("  - created {id}"));
            }
            for id in &summary.skipped {
                lines.push(format!("  - skipped {id}"));
            }
            CommandResult::success("seed", lines.join("\n"))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
