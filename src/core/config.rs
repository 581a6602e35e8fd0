//! Configuration structures and types for webstore-publisher
//!
//! Every section is optional; unset values fall back to built-in defaults
//! when resolved into runtime settings.

use crate::core::poll::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, PollOptions};
use crate::store::backend::{BackendConfig, CHROME_API_BASE, CHROME_OAUTH_BASE};
use crate::store::http::HttpSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PublisherConfig {
    /// Store endpoint overrides (optional, Chrome Web Store when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,

    /// Upload status polling (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling: Option<PollingConfig>,

    /// HTTP client settings (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpConfig>,

    /// Default publish flags (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishDefaults>,
}

/// Store backend overrides
///
/// `oauthBase` and `apiBase` rebase the Chrome Web Store layout; the other
/// fields replace individual [`BackendConfig`] values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_target_param: Option<String>,

    /// Merged over the built-in headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    /// Set to false for stores that only signal success or failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reports_item_errors: Option<bool>,
}

/// Upload status polling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PollingConfig {
    /// Seconds between status checks (default: 10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,

    /// Maximum number of status checks (default: unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Overall polling deadline in seconds, 0 disables it (default: 1800)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Connection timeout in seconds (default: 30)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,

    /// Timeout for token, status and publish requests (default: 60)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Publish flags that apply when the command line leaves them unset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PublishDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tester_only: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_only: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_review_pending: Option<bool>,
}

impl PublisherConfig {
    /// Resolve the store backend, starting from the Chrome Web Store
    pub fn backend(&self) -> BackendConfig {
        let Some(store) = &self.store else {
            return BackendConfig::chrome_web_store();
        };

        let mut backend = match (&store.oauth_base, &store.api_base) {
            (None, None) => BackendConfig::chrome_web_store(),
            (oauth, api) => BackendConfig::chrome_web_store_at(
                oauth.as_deref().unwrap_or(CHROME_OAUTH_BASE),
                api.as_deref().unwrap_or(CHROME_API_BASE),
            ),
        };

        if let Some(name) = &store.name {
            backend.name = name.clone();
        }
        if let Some(url) = &store.token_url {
            backend.token_url = url.clone();
        }
        if let Some(url) = &store.upload_url {
            backend.upload_url = url.clone();
        }
        if let Some(url) = &store.status_url {
            backend.status_url = url.clone();
        }
        if let Some(url) = &store.publish_url {
            backend.publish_url = url.clone();
        }
        if let Some(param) = &store.publish_target_param {
            backend.publish_target_param = param.clone();
        }
        if let Some(headers) = &store.headers {
            backend.headers.extend(headers.clone());
        }
        if let Some(reports) = store.reports_item_errors {
            backend.reports_item_errors = reports;
        }

        backend
    }

    pub fn poll_options(&self) -> PollOptions {
        let polling = self.polling.clone().unwrap_or_default();

        PollOptions {
            interval: polling
                .interval_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            max_attempts: polling.max_attempts,
            timeout: match polling.timeout_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => Some(DEFAULT_POLL_TIMEOUT),
            },
        }
    }

    pub fn http_settings(&self) -> HttpSettings {
        let defaults = HttpSettings::default();
        let Some(http) = &self.http else {
            return defaults;
        };

        HttpSettings {
            connect_timeout: http
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            request_timeout: http
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            user_agent: http.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    pub fn publish_defaults(&self) -> PublishDefaults {
        self.publish.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_resolves_to_chrome() {
        let config = PublisherConfig::default();

        assert_eq!(config.backend(), BackendConfig::chrome_web_store());
        assert_eq!(config.poll_options(), PollOptions::default());
        assert_eq!(config.http_settings(), HttpSettings::default());
    }

    #[test]
    fn test_deserialize_yaml() {
        let yaml = r#"
store:
  name: mirror
  apiBase: http://localhost:8080
  reportsItemErrors: false
  headers:
    x-extra: "1"
polling:
  intervalSecs: 2
  maxAttempts: 5
http:
  requestTimeoutSecs: 15
publish:
  testerOnly: true
"#;
        let config: PublisherConfig = serde_yaml::from_str(yaml).unwrap();
        let backend = config.backend();

        assert_eq!(backend.name, "mirror");
        assert!(backend.upload_url.starts_with("http://localhost:8080/upload/"));
        assert_eq!(backend.token_url, "https://oauth2.googleapis.com/token");
        assert!(!backend.reports_item_errors);
        assert_eq!(backend.headers.get("x-extra").map(String::as_str), Some("1"));
        assert_eq!(backend.headers.get("x-goog-api-version").map(String::as_str), Some("2"));

        let poll = config.poll_options();
        assert_eq!(poll.interval, Duration::from_secs(2));
        assert_eq!(poll.max_attempts, Some(5));
        assert_eq!(poll.timeout, Some(DEFAULT_POLL_TIMEOUT));

        assert_eq!(config.http_settings().request_timeout, Duration::from_secs(15));
        assert_eq!(config.publish_defaults().tester_only, Some(true));
    }

    #[test]
    fn test_deserialize_toml() {
        let text = r#"
[polling]
intervalSecs = 3
timeoutSecs = 0

[store]
publishTargetParam = "target"
"#;
        let config: PublisherConfig = toml::from_str(text).unwrap();

        assert_eq!(config.poll_options().interval, Duration::from_secs(3));
        assert_eq!(config.poll_options().timeout, None);
        assert_eq!(config.backend().publish_target_param, "target");
    }

    #[test]
    fn test_serialize_skips_unset_sections() {
        let config = PublisherConfig {
            polling: Some(PollingConfig {
                interval_secs: Some(10),
                ..Default::default()
            }),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();

        assert!(yaml.contains("intervalSecs: 10"));
        assert!(!yaml.contains("store"));
        assert!(!yaml.contains("maxAttempts"));
    }
}
