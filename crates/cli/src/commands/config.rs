use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use planos_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut push = |key: &str, value: &str, env_key: Option<&str>| {
        lines.push(render_line(
            key,
            value,
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    };

    push("database.url", &config.database.url, Some("PLANOS_DATABASE_URL"));
    push(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        Some("PLANOS_DATABASE_MAX_CONNECTIONS"),
    );
    push(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        Some("PLANOS_DATABASE_TIMEOUT_SECS"),
    );

    push("mailer.enabled", &config.mailer.enabled.to_string(), Some("PLANOS_MAILER_ENABLED"));
    let smtp_host =
        if config.mailer.smtp_host.is_empty() { "<unset>" } else { config.mailer.smtp_host.as_str() };
    push("mailer.smtp_host", smtp_host, Some("PLANOS_MAILER_SMTP_HOST"));
    push("mailer.smtp_port", &config.mailer.smtp_port.to_string(), Some("PLANOS_MAILER_SMTP_PORT"));
    push("mailer.from_address", &config.mailer.from_address, Some("PLANOS_MAILER_FROM_ADDRESS"));

    let username = config
        .mailer
        .username
        .as_ref()
        .map(|value| redact(value.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    push("mailer.username", &username, Some("PLANOS_MAILER_USERNAME"));
    let password = if config.mailer.password.is_some() { "<redacted>" } else { "<unset>" };
    push("mailer.password", password, Some("PLANOS_MAILER_PASSWORD"));

    let catalog = match &config.catalog.groups {
        Some(groups) => format!("{} configured group(s)", groups.len()),
        None => "builtin".to_string(),
    };
    push("catalog.groups", &catalog, None);

    push("logging.level", &config.logging.level, Some("PLANOS_LOGGING_LEVEL"));
    push("logging.format", &format!("{:?}", config.logging.format), Some("PLANOS_LOGGING_FORMAT"));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("planos.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/planos.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => format!("{first}***"),
        None => "<redacted>".to_string(),
    }
}
