use std::env;
use std::sync::{Mutex, OnceLock};

use planos_cli::commands::{approve, migrate, reject, seed, status, upload};
use planos_cli::ActorArgs;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("PLANOS_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("PLANOS_DATABASE_URL", "postgres://nope/planos")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = TempDir::new().expect("tempdir");
    let url = file_db_url(&dir);

    with_env(&[("PLANOS_DATABASE_URL", &url)], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["status"], "ok");
        let message = first_payload["message"].as_str().unwrap_or("");
        assert!(message.contains("2 created, 0 already present"));
        assert!(message.contains("created SOL-DEMO-1"));

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        let message = second_payload["message"].as_str().unwrap_or("");
        assert!(message.contains("0 created, 2 already present"));
    });
}

#[test]
fn status_reports_missing_requests_as_not_found() {
    with_env(&[("PLANOS_DATABASE_URL", "sqlite::memory:")], || {
        let result = status::run(Some("SOL-NO-EXISTE"), None);
        assert_eq!(result.exit_code, 6, "expected not-found exit code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "not_found");
    });
}

#[test]
fn approval_flow_runs_end_to_end_through_the_commands() {
    let dir = TempDir::new().expect("tempdir");
    let url = file_db_url(&dir);

    with_env(&[("PLANOS_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0, "seed should succeed");

        // SOL-DEMO-1 starts with sostenibilidad active.
        let result = approve::run("SOL-DEMO-1", &reviewer("sostenibilidad"));
        assert_eq!(result.exit_code, 0, "sustainability approval should apply");
        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("status is now en_revision"));

        // The same reviewer is no longer a member of the active group.
        let repeat = approve::run("SOL-DEMO-1", &reviewer("sostenibilidad"));
        assert_eq!(repeat.exit_code, 7, "expected workflow precondition failure");
        let payload = parse_payload(&repeat.output);
        assert_eq!(payload["error_class"], "workflow");

        let listing = status::run(None, Some("en_revision"));
        assert_eq!(listing.exit_code, 0);
        let payload = parse_payload(&listing.output);
        assert!(payload["message"].as_str().unwrap_or("").contains("SOL-DEMO-1"));
    });
}

#[test]
fn rejection_returns_the_request_to_sustainability() {
    let dir = TempDir::new().expect("tempdir");
    let url = file_db_url(&dir);

    with_env(&[("PLANOS_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0, "seed should succeed");
        assert_eq!(
            approve::run("SOL-DEMO-1", &reviewer("sostenibilidad")).exit_code,
            0,
            "advance to gastronomia"
        );

        let result = reject::run(
            "SOL-DEMO-1",
            "plano de cocina sin salidas de emergencia",
            &reviewer("gastronomia"),
        );
        assert_eq!(result.exit_code, 0, "rejection should apply");
        let payload = parse_payload(&result.output);
        assert!(payload["message"]
            .as_str()
            .unwrap_or("")
            .contains("returned to areas_sostenibilidad"));

        let detail = status::run(Some("SOL-DEMO-1"), None);
        assert_eq!(detail.exit_code, 0);
        let payload = parse_payload(&detail.output);
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("\"needs_document_review\": true"));
        assert!(message.contains("plano de cocina sin salidas de emergencia"));
    });
}

#[test]
fn upload_requires_permission_and_persists_the_document() {
    let dir = TempDir::new().expect("tempdir");
    let url = file_db_url(&dir);

    with_env(&[("PLANOS_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0, "seed should succeed");

        let denied = upload::run(
            "SOL-DEMO-1",
            "plano-cocina.pdf",
            "https://files.example/plano-cocina.pdf",
            2048,
            false,
            &reviewer("gastronomia"),
        );
        assert_eq!(denied.exit_code, 7, "non-uploading group must be rejected");
        assert_eq!(parse_payload(&denied.output)["error_class"], "workflow");

        let accepted = upload::run(
            "SOL-DEMO-1",
            "plano-cocina.pdf",
            "https://files.example/plano-cocina.pdf",
            2048,
            false,
            &reviewer("sostenibilidad"),
        );
        assert_eq!(accepted.exit_code, 0, "sustainability upload should apply");
        let payload = parse_payload(&accepted.output);
        assert!(payload["message"].as_str().unwrap_or("").contains("1 document(s) on file"));

        let removed = upload::run(
            "SOL-DEMO-1",
            "plano-cocina.pdf",
            "",
            0,
            true,
            &reviewer("sostenibilidad"),
        );
        assert_eq!(removed.exit_code, 0, "removal of an existing plan should apply");
        let payload = parse_payload(&removed.output);
        assert!(payload["message"].as_str().unwrap_or("").contains("0 document(s) on file"));
    });
}

fn reviewer(role: &str) -> ActorArgs {
    ActorArgs {
        user: format!("u-{role}"),
        name: format!("Reviewer {role}"),
        email: format!("{role}@example.com"),
        roles: vec![role.to_string()],
    }
}

fn file_db_url(dir: &TempDir) -> String {
    format!("sqlite://{}/planos.db?mode=rwc", dir.path().display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PLANOS_DATABASE_URL",
        "PLANOS_DATABASE_MAX_CONNECTIONS",
        "PLANOS_DATABASE_TIMEOUT_SECS",
        "PLANOS_MAILER_ENABLED",
        "PLANOS_MAILER_SMTP_HOST",
        "PLANOS_MAILER_SMTP_PORT",
        "PLANOS_MAILER_FROM_ADDRESS",
        "PLANOS_MAILER_USERNAME",
        "PLANOS_MAILER_PASSWORD",
        "PLANOS_LOGGING_LEVEL",
        "PLANOS_LOGGING_FORMAT",
        "PLANOS_LOG_LEVEL",
        "PLANOS_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
