//! Configuration file loader for webstore-publisher
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::StoreError;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Configuration file names, searched in order
const CONFIG_FILENAMES: [&str; 3] = [
    ".webstore-publisher.yaml",
    ".webstore-publisher.yml",
    ".webstore-publisher.toml",
];

pub const POLL_INTERVAL_VAR: &str = "WEBSTORE_POLL_INTERVAL_SECS";
pub const POLL_TIMEOUT_VAR: &str = "WEBSTORE_POLL_TIMEOUT_SECS";
pub const POLL_MAX_ATTEMPTS_VAR: &str = "WEBSTORE_POLL_MAX_ATTEMPTS";
pub const CONNECT_TIMEOUT_VAR: &str = "WEBSTORE_CONNECT_TIMEOUT_SECS";

lazy_static! {
    /// Environment variable pattern (${VAR_NAME})
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
}

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Directory searched for a config file
    pub project_path: PathBuf,

    /// Config file given on the command line; must exist when set
    pub explicit_path: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<PublisherConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "polling.intervalSecs")
    pub field: String,

    /// Error message
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Config file (explicit path, or the first of
    ///    `.webstore-publisher.{yaml,yml,toml}` in the project directory)
    /// 4. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublisherConfig, StoreError> {
        let mut configs: Vec<PublisherConfig> = vec![PublisherConfig::default()];

        let file_config = match &options.explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(StoreError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::load_config_file(path).await?
            }
            None => Self::load_project_config(&options.project_path).await?,
        };
        if let Some(file_config) = file_config {
            configs.push(file_config);
        }

        if let Some(env_config) = Self::load_env_config(&options.env)? {
            configs.push(env_config);
        }

        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged_config = Self::merge_configs(configs);

        Ok(Self::expand_env_vars(merged_config, &options.env))
    }

    async fn load_project_config(
        project_path: &Path,
    ) -> Result<Option<PublisherConfig>, StoreError> {
        for filename in CONFIG_FILENAMES {
            let candidate = project_path.join(filename);
            if candidate.exists() {
                return Self::load_config_file(&candidate).await;
            }
        }

        Ok(None)
    }

    /// Load configuration from a YAML or TOML file, chosen by extension
    async fn load_config_file(file_path: &Path) -> Result<Option<PublisherConfig>, StoreError> {
        if !file_path.exists() {
            return Ok(None);
        }

        debug!("Loading config file {}", file_path.display());

        let content = fs::read_to_string(file_path).await.map_err(|e| {
            StoreError::Config(format!(
                "Failed to read config file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        let is_toml = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let config = if is_toml {
            toml::from_str(&content).map_err(|e| {
                StoreError::Config(format!("Failed to parse TOML config: {}", e))
            })?
        } else if content.trim().is_empty() {
            PublisherConfig::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                StoreError::Config(format!("Failed to parse YAML config: {}", e))
            })?
        };

        Ok(Some(config))
    }

    /// Load configuration from environment variables
    fn load_env_config(
        env: &HashMap<String, String>,
    ) -> Result<Option<PublisherConfig>, StoreError> {
        let mut config = PublisherConfig::default();
        let mut has_changes = false;

        let interval = parse_env::<u64>(env, POLL_INTERVAL_VAR)?;
        let timeout = parse_env::<u64>(env, POLL_TIMEOUT_VAR)?;
        let max_attempts = parse_env::<u32>(env, POLL_MAX_ATTEMPTS_VAR)?;
        if interval.is_some() || timeout.is_some() || max_attempts.is_some() {
            config.polling = Some(PollingConfig {
                interval_secs: interval,
                max_attempts,
                timeout_secs: timeout,
            });
            has_changes = true;
        }

        if let Some(connect) = parse_env::<u64>(env, CONNECT_TIMEOUT_VAR)? {
            config.http = Some(HttpConfig {
                connect_timeout_secs: Some(connect),
                ..Default::default()
            });
            has_changes = true;
        }

        Ok(if has_changes { Some(config) } else { None })
    }

    /// Merge multiple configurations with priority
    pub fn merge_configs(configs: Vec<PublisherConfig>) -> PublisherConfig {
        let mut result = PublisherConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target, field by field
    fn merge_into(target: &mut PublisherConfig, source: PublisherConfig) {
        if let Some(source_store) = source.store {
            let store = target.store.get_or_insert_with(StoreConfig::default);
            overwrite(&mut store.name, source_store.name);
            overwrite(&mut store.oauth_base, source_store.oauth_base);
            overwrite(&mut store.api_base, source_store.api_base);
            overwrite(&mut store.token_url, source_store.token_url);
            overwrite(&mut store.upload_url, source_store.upload_url);
            overwrite(&mut store.status_url, source_store.status_url);
            overwrite(&mut store.publish_url, source_store.publish_url);
            overwrite(&mut store.publish_target_param, source_store.publish_target_param);
            overwrite(&mut store.reports_item_errors, source_store.reports_item_errors);
            if let Some(source_headers) = source_store.headers {
                store.headers.get_or_insert_with(Default::default).extend(source_headers);
            }
        }

        if let Some(source_polling) = source.polling {
            let polling = target.polling.get_or_insert_with(PollingConfig::default);
            overwrite(&mut polling.interval_secs, source_polling.interval_secs);
            overwrite(&mut polling.max_attempts, source_polling.max_attempts);
            overwrite(&mut polling.timeout_secs, source_polling.timeout_secs);
        }

        if let Some(source_http) = source.http {
            let http = target.http.get_or_insert_with(HttpConfig::default);
            overwrite(&mut http.connect_timeout_secs, source_http.connect_timeout_secs);
            overwrite(&mut http.request_timeout_secs, source_http.request_timeout_secs);
            overwrite(&mut http.user_agent, source_http.user_agent);
        }

        if let Some(source_publish) = source.publish {
            let publish = target.publish.get_or_insert_with(PublishDefaults::default);
            overwrite(&mut publish.tester_only, source_publish.tester_only);
            overwrite(&mut publish.upload_only, source_publish.upload_only);
            overwrite(&mut publish.allow_review_pending, source_publish.allow_review_pending);
        }
    }

    /// Expand `${VAR}` references in string settings
    fn expand_env_vars(
        mut config: PublisherConfig,
        env: &HashMap<String, String>,
    ) -> PublisherConfig {
        if let Some(store) = &mut config.store {
            for value in [
                &mut store.name,
                &mut store.oauth_base,
                &mut store.api_base,
                &mut store.token_url,
                &mut store.upload_url,
                &mut store.status_url,
                &mut store.publish_url,
                &mut store.publish_target_param,
            ]
            .into_iter()
            .flatten()
            {
                *value = Self::expand_string(value, env);
            }

            if let Some(headers) = &mut store.headers {
                for value in headers.values_mut() {
                    *value = Self::expand_string(value, env);
                }
            }
        }

        if let Some(http) = &mut config.http
            && let Some(user_agent) = &mut http.user_agent
        {
            *user_agent = Self::expand_string(user_agent, env);
        }

        config
    }

    /// Expand environment variables in a single string
    ///
    /// Unknown variables are left in place.
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        ENV_VAR_PATTERN
            .replace_all(input, |caps: &Captures| match env.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    warn!("Environment variable {} not found", &caps[1]);
                    caps[0].to_string()
                }
            })
            .into_owned()
    }

    /// Validate configuration
    pub fn validate(config: &PublisherConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Store endpoints
        for (field, message) in config.backend().problems() {
            errors.push(ConfigValidationError { field, message });
        }

        if let Some(store) = &config.store {
            Self::validate_store(store, &mut warnings);
        }

        // 2. Polling bounds
        if let Some(polling) = &config.polling {
            Self::validate_polling(polling, &mut errors, &mut warnings);
        }

        // 3. HTTP timeouts
        if let Some(http) = &config.http {
            for (field, value) in [
                ("http.connectTimeoutSecs", http.connect_timeout_secs),
                ("http.requestTimeoutSecs", http.request_timeout_secs),
            ] {
                if value == Some(0) {
                    errors.push(ConfigValidationError {
                        field: field.to_string(),
                        message: "timeout must be greater than 0".to_string(),
                    });
                }
            }
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn validate_store(store: &StoreConfig, warnings: &mut Vec<ConfigValidationWarning>) {
        let urls = [
            ("store.oauthBase", &store.oauth_base),
            ("store.apiBase", &store.api_base),
            ("store.tokenUrl", &store.token_url),
            ("store.uploadUrl", &store.upload_url),
            ("store.statusUrl", &store.status_url),
            ("store.publishUrl", &store.publish_url),
        ];

        for (field, value) in urls {
            let Some(value) = value else { continue };

            if ENV_VAR_PATTERN.is_match(value) {
                warnings.push(ConfigValidationWarning {
                    field: field.to_string(),
                    message: format!("Unexpanded environment variable in {}", value),
                    suggestion: Some("Export the variable before running".to_string()),
                });
            } else if value.starts_with("http://") {
                warnings.push(ConfigValidationWarning {
                    field: field.to_string(),
                    message: "Credentials and tokens will be sent without TLS".to_string(),
                    suggestion: Some("Use an https:// URL outside of local testing".to_string()),
                });
            }
        }
    }

    fn validate_polling(
        polling: &PollingConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        if polling.interval_secs == Some(0) {
            errors.push(ConfigValidationError {
                field: "polling.intervalSecs".to_string(),
                message: "interval must be greater than 0".to_string(),
            });
        }

        if polling.max_attempts == Some(0) {
            errors.push(ConfigValidationError {
                field: "polling.maxAttempts".to_string(),
                message: "maxAttempts must be greater than 0".to_string(),
            });
        }

        if polling.timeout_secs == Some(0) && polling.max_attempts.is_none() {
            warnings.push(ConfigValidationWarning {
                field: "polling.timeoutSecs".to_string(),
                message: "Polling is unbounded".to_string(),
                suggestion: Some("Set timeoutSecs or maxAttempts".to_string()),
            });
        }

        if let (Some(interval), Some(timeout)) = (polling.interval_secs, polling.timeout_secs)
            && timeout > 0
            && timeout < interval
        {
            warnings.push(ConfigValidationWarning {
                field: "polling.timeoutSecs".to_string(),
                message: format!("Timeout {}s is shorter than the interval {}s", timeout, interval),
                suggestion: Some(
                    "Only one status check will run, when the deadline is reached".to_string(),
                ),
            });
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

fn overwrite<T>(target: &mut Option<T>, source: Option<T>) {
    if source.is_some() {
        *target = source;
    }
}

fn parse_env<T: std::str::FromStr>(
    env: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>, StoreError> {
    match env.get(name).map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            StoreError::Config(format!("{} must be a non-negative integer, got {:?}", name, raw))
        }),
    }
}
