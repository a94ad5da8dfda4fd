use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{CatalogError, GroupCatalog};
use crate::domain::group::ApprovalGroup;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub mailer: MailerConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MailerConfig {
    /// Disabled by default; with the mailer off, notifications are rendered
    /// and recorded but not handed to an SMTP relay.
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub username: Option<SecretString>,
    pub password: Option<SecretString>,
}

/// Group catalog as configuration. Absent groups fall back to the builtin
/// convention-center set.
#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    pub groups: Option<Vec<ApprovalGroup>>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub mailer_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("group catalog is invalid: {0}")]
    Catalog(#[from] CatalogError),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://planos.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            mailer: MailerConfig {
                enabled: false,
                smtp_host: String::new(),
                smtp_port: 587,
                from_address: "planos@centroconvenciones.example".to_string(),
                username: None,
                password: None,
            },
            catalog: CatalogConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("planos.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Effective group catalog: configured groups when present, the builtin
    /// set otherwise. Catalog invariants are validated either way.
    pub fn group_catalog(&self) -> Result<GroupCatalog, ConfigError> {
        match &self.catalog.groups {
            Some(groups) => Ok(GroupCatalog::new(groups.clone())?),
            None => Ok(GroupCatalog::builtin()),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(mailer) = patch.mailer {
            if let Some(enabled) = mailer.enabled {
                self.mailer.enabled = enabled;
            }
            if let Some(smtp_host) = mailer.smtp_host {
                self.mailer.smtp_host = smtp_host;
            }
            if let Some(smtp_port) = mailer.smtp_port {
                self.mailer.smtp_port = smtp_port;
            }
            if let Some(from_address) = mailer.from_address {
                self.mailer.from_address = from_address;
            }
            if let Some(username) = mailer.username {
                self.mailer.username = Some(username.into());
            }
            if let Some(password) = mailer.password {
                self.mailer.password = Some(password.into());
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(groups) = catalog.groups {
                self.catalog.groups = Some(groups);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PLANOS_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PLANOS_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("PLANOS_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PLANOS_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PLANOS_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PLANOS_MAILER_ENABLED") {
            self.mailer.enabled = parse_bool("PLANOS_MAILER_ENABLED", &value)?;
        }
        if let Some(value) = read_env("PLANOS_MAILER_SMTP_HOST") {
            self.mailer.smtp_host = value;
        }
        if let Some(value) = read_env("PLANOS_MAILER_SMTP_PORT") {
            self.mailer.smtp_port = parse_u16("PLANOS_MAILER_SMTP_PORT", &value)?;
        }
        if let Some(value) = read_env("PLANOS_MAILER_FROM_ADDRESS") {
            self.mailer.from_address = value;
        }
        if let Some(value) = read_env("PLANOS_MAILER_USERNAME") {
            self.mailer.username = Some(value.into());
        }
        if let Some(value) = read_env("PLANOS_MAILER_PASSWORD") {
            self.mailer.password = Some(value.into());
        }

        let log_level = read_env("PLANOS_LOGGING_LEVEL").or_else(|| read_env("PLANOS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PLANOS_LOGGING_FORMAT").or_else(|| read_env("PLANOS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(mailer_enabled) = overrides.mailer_enabled {
            self.mailer.enabled = mailer_enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_mailer(&self.mailer)?;
        validate_logging(&self.logging)?;
        if let Some(groups) = &self.catalog.groups {
            GroupCatalog::new(groups.clone())?;
        }
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("planos.toml"), PathBuf::from("config/planos.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_mailer(mailer: &MailerConfig) -> Result<(), ConfigError> {
    if !mailer.enabled {
        return Ok(());
    }

    if mailer.smtp_host.trim().is_empty() {
        return Err(ConfigError::Validation(
            "mailer.smtp_host is required when the mailer is enabled".to_string(),
        ));
    }
    if mailer.smtp_port == 0 {
        return Err(ConfigError::Validation(
            "mailer.smtp_port must be greater than zero".to_string(),
        ));
    }
    if !mailer.from_address.contains('@') {
        return Err(ConfigError::Validation(
            "mailer.from_address must be a valid email address".to_string(),
        ));
    }

    let has_username = mailer
        .username
        .as_ref()
        .map(|value| !value.expose_secret().trim().is_empty())
        .unwrap_or(false);
    let has_password = mailer
        .password
        .as_ref()
        .map(|value| !value.expose_secret().trim().is_empty())
        .unwrap_or(false);
    if has_username != has_password {
        return Err(ConfigError::Validation(
            "mailer.username and mailer.password must be configured together".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    mailer: Option<MailerPatch>,
    catalog: Option<CatalogPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MailerPatch {
    enabled: Option<bool>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    from_address: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    groups: Option<Vec<ApprovalGroup>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_use_builtin_catalog() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config =
            AppConfig::load(LoadOptions::default()).map_err(|err| format!("load failed: {err}"))?;
        let catalog = config.group_catalog().map_err(|err| format!("catalog failed: {err}"))?;

        ensure(catalog.groups().len() == 5, "builtin catalog should carry five groups")?;
        ensure(
            catalog.groups()[0].id.is_sustainability(),
            "sustainability must lead the builtin catalog",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation_and_catalog_groups() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PLANOS_SMTP_HOST", "smtp.interp.example");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("planos.toml");
            fs::write(
                &path,
                r#"
[mailer]
enabled = true
smtp_host = "${TEST_PLANOS_SMTP_HOST}"
from_address = "planos@example.com"

[[catalog.groups]]
id = "areas_sostenibilidad"
name = "Áreas y Sostenibilidad"
roles = ["sostenibilidad"]
emails = ["sostenibilidad@example.com"]
sequence_index = 0
can_upload_plans = true

[[catalog.groups]]
id = "gastronomia"
name = "Gastronomía"
roles = ["gastronomia"]
emails = ["gastronomia@example.com"]
sequence_index = 1
conditional_service = "gastronomia"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.mailer.smtp_host == "smtp.interp.example",
                "smtp host should be interpolated from the environment",
            )?;
            let catalog =
                config.group_catalog().map_err(|err| format!("catalog failed: {err}"))?;
            ensure(catalog.groups().len() == 2, "configured catalog should replace builtin")?;
            Ok(())
        })();

        clear_vars(&["TEST_PLANOS_SMTP_HOST"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PLANOS_DATABASE_URL", "sqlite://from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("planos.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should win")?;
            Ok(())
        })();

        clear_vars(&["PLANOS_DATABASE_URL"]);
        result
    }

    #[test]
    fn enabled_mailer_without_host_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PLANOS_MAILER_ENABLED", "true");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("mailer.smtp_host")
            );
            ensure(has_message, "validation failure should mention mailer.smtp_host")
        })();

        clear_vars(&["PLANOS_MAILER_ENABLED"]);
        result
    }

    #[test]
    fn invalid_catalog_in_file_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("planos.toml");
        fs::write(
            &path,
            r#"
[[catalog.groups]]
id = "gastronomia"
name = "Gastronomía"
sequence_index = 1
"#,
        )
        .map_err(|err| err.to_string())?;

        match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() }) {
            Ok(_) => Err("catalog without sustainability should fail".to_string()),
            Err(ConfigError::Catalog(_)) => Ok(()),
            Err(other) => Err(format!("unexpected error class: {other}")),
        }
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PLANOS_MAILER_USERNAME", "relay-user");
        env::set_var("PLANOS_MAILER_PASSWORD", "relay-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("relay-secret-value"),
                "debug output should not contain the smtp password",
            )?;
            ensure(
                config
                    .mailer
                    .password
                    .as_ref()
                    .map(|secret| secret.expose_secret() == "relay-secret-value")
                    .unwrap_or(false),
                "password should still be readable through expose_secret",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["PLANOS_MAILER_USERNAME", "PLANOS_MAILER_PASSWORD"]);
        result
    }
}
