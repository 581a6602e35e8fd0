//! Store backend descriptor
//!
//! Endpoints, parameter names and reporting capabilities of a web store API.
//! The Chrome Web Store is built in; any field can be overridden from the
//! config file to target a compatible store or a local mirror.

use crate::core::error::StoreError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder substituted with the extension id in endpoint templates
pub const EXTENSION_ID_PLACEHOLDER: &str = "{extension_id}";

pub(crate) const CHROME_OAUTH_BASE: &str = "https://oauth2.googleapis.com";
pub(crate) const CHROME_API_BASE: &str = "https://www.googleapis.com";

/// Endpoints and behavior of one store API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Name used in logs and errors
    pub name: String,
    /// OAuth2 token endpoint
    pub token_url: String,
    /// PUT target for the package bytes
    pub upload_url: String,
    /// GET target for the draft item status
    pub status_url: String,
    /// POST target for the publish request
    pub publish_url: String,
    /// Query parameter carrying the audience selector
    pub publish_target_param: String,
    /// Static headers sent with every store request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Whether failed uploads come with item-level errors
    #[serde(default = "default_reports_item_errors")]
    pub reports_item_errors: bool,
}

fn default_reports_item_errors() -> bool {
    true
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::chrome_web_store()
    }
}

impl BackendConfig {
    /// The Chrome Web Store API v1.1
    ///
    /// # Examples
    ///
    /// ```
    /// use webstore_publisher::store::BackendConfig;
    ///
    /// let backend = BackendConfig::chrome_web_store();
    /// assert_eq!(
    ///     backend.upload_endpoint("abc").unwrap().as_str(),
    ///     "https://www.googleapis.com/upload/chromewebstore/v1.1/items/abc?uploadType=media"
    /// );
    /// ```
    pub fn chrome_web_store() -> Self {
        Self::chrome_web_store_at(CHROME_OAUTH_BASE, CHROME_API_BASE)
    }

    /// Chrome Web Store layout rooted at other hosts
    pub fn chrome_web_store_at(oauth_base: &str, api_base: &str) -> Self {
        let oauth_base = oauth_base.trim_end_matches('/');
        let api_base = api_base.trim_end_matches('/');

        let mut headers = BTreeMap::new();
        headers.insert("x-goog-api-version".to_string(), "2".to_string());

        Self {
            name: "chrome-web-store".to_string(),
            token_url: format!("{}/token", oauth_base),
            upload_url: format!(
                "{}/upload/chromewebstore/v1.1/items/{}?uploadType=media",
                api_base, EXTENSION_ID_PLACEHOLDER
            ),
            status_url: format!(
                "{}/chromewebstore/v1.1/items/{}?projection=DRAFT",
                api_base, EXTENSION_ID_PLACEHOLDER
            ),
            publish_url: format!(
                "{}/chromewebstore/v1.1/items/{}/publish",
                api_base, EXTENSION_ID_PLACEHOLDER
            ),
            publish_target_param: "publishTarget".to_string(),
            headers,
            reports_item_errors: true,
        }
    }

    pub fn token_endpoint(&self) -> Result<Url, StoreError> {
        Url::parse(&self.token_url)
            .map_err(|e| StoreError::Config(format!("invalid tokenUrl {}: {}", self.token_url, e)))
    }

    pub fn upload_endpoint(&self, extension_id: &str) -> Result<Url, StoreError> {
        render("uploadUrl", &self.upload_url, extension_id)
    }

    pub fn status_endpoint(&self, extension_id: &str) -> Result<Url, StoreError> {
        render("statusUrl", &self.status_url, extension_id)
    }

    pub fn publish_endpoint(&self, extension_id: &str) -> Result<Url, StoreError> {
        render("publishUrl", &self.publish_url, extension_id)
    }

    /// Problems that would make every request fail, as (field, message) pairs
    pub fn problems(&self) -> Vec<(String, String)> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push(("store.name".to_string(), "name is required".to_string()));
        }
        if let Err(e) = Url::parse(&self.token_url) {
            problems.push(("store.tokenUrl".to_string(), e.to_string()));
        }
        for (field, template) in [
            ("store.uploadUrl", &self.upload_url),
            ("store.statusUrl", &self.status_url),
            ("store.publishUrl", &self.publish_url),
        ] {
            if !template.contains(EXTENSION_ID_PLACEHOLDER) {
                problems.push((
                    field.to_string(),
                    format!("template must contain {}", EXTENSION_ID_PLACEHOLDER),
                ));
            } else if let Err(e) = Url::parse(&template.replace(EXTENSION_ID_PLACEHOLDER, "x")) {
                problems.push((field.to_string(), e.to_string()));
            }
        }
        if self.publish_target_param.trim().is_empty() {
            problems.push((
                "store.publishTargetParam".to_string(),
                "parameter name is required".to_string(),
            ));
        }

        problems
    }
}

fn render(field: &str, template: &str, extension_id: &str) -> Result<Url, StoreError> {
    if extension_id.is_empty()
        || !extension_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StoreError::Config(format!(
            "invalid extension id: {:?}",
            extension_id
        )));
    }

    let rendered = template.replace(EXTENSION_ID_PLACEHOLDER, extension_id);
    Url::parse(&rendered)
        .map_err(|e| StoreError::Config(format!("invalid {} {}: {}", field, rendered, e)))
}
