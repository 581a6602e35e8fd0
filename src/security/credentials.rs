//! Credential handling with memory-safe storage and log redaction
//!
//! The OAuth client id, client secret and refresh token are held in
//! `secrecy` wrappers so they never reach a `Debug` or log line by accident.
//! [`Redactor`] masks any of them, and any OAuth token field, inside
//! arbitrary text before it is logged.

use crate::core::error::StoreError;
use aho_corasick::AhoCorasick;
use lazy_static::lazy_static;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

/// Environment variables the CLI reads credentials from
pub const CLIENT_ID_VAR: &str = "CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "CLIENT_SECRET";
pub const REFRESH_TOKEN_VAR: &str = "REFRESH_TOKEN";

lazy_static! {
    /// `"access_token": "..."` style fields in raw OAuth bodies
    static ref TOKEN_FIELD: Regex =
        Regex::new(r#""(access_token|refresh_token|id_token)"\s*:\s*"([^"]*)""#).unwrap();
}

/// OAuth client credentials plus the long-lived refresh token
#[derive(Clone)]
pub struct Credentials {
    client_id: SecretString,
    client_secret: SecretString,
    refresh_token: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &mask_token(self.client_id()))
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials, rejecting blank fields
    ///
    /// # Examples
    ///
    /// ```
    /// use webstore_publisher::security::Credentials;
    ///
    /// let credentials =
    ///     Credentials::new("id.apps.googleusercontent.com", "secret", "1//refresh").unwrap();
    /// assert_eq!(credentials.client_id(), "id.apps.googleusercontent.com");
    /// assert!(Credentials::new("", "secret", "1//refresh").is_err());
    /// ```
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        let refresh_token = refresh_token.into();

        for (field, value) in [
            ("client id", &client_id),
            ("client secret", &client_secret),
            ("refresh token", &refresh_token),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::InvalidCredentials(format!("{} is empty", field)));
            }
        }

        Ok(Self {
            client_id: SecretString::new(client_id.into()),
            client_secret: SecretString::new(client_secret.into()),
            refresh_token: SecretString::new(refresh_token.into()),
        })
    }

    pub fn client_id(&self) -> &str {
        self.client_id.expose_secret()
    }

    pub fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    pub fn refresh_token(&self) -> &str {
        self.refresh_token.expose_secret()
    }

    /// Secret values worth masking in log output
    pub fn sensitive_values(&self) -> Vec<&str> {
        vec![self.client_id(), self.client_secret(), self.refresh_token()]
    }
}

/// Masks a token for safe logging
///
/// Shows only the first 3 and last 3 characters for identification purposes.
/// Tokens shorter than 10 characters are fully masked as "****".
///
/// # Examples
///
/// ```
/// use webstore_publisher::security::mask_token;
///
/// assert_eq!(mask_token("abcdef123456"), "abc...456");
/// assert_eq!(mask_token("short"), "****");
/// ```
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }

    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

/// Replaces known secret values in text before it is logged
///
/// With `reveal` set, text passes through untouched; the CLI only enables this
/// for verbose debugging sessions.
#[derive(Debug, Clone)]
pub struct Redactor {
    matcher: Option<AhoCorasick>,
    masks: Vec<String>,
    reveal: bool,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(&[], false)
    }
}

impl Redactor {
    pub fn new(secrets: &[&str], reveal: bool) -> Self {
        let secrets: Vec<String> = secrets
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        let matcher = if secrets.is_empty() {
            None
        } else {
            AhoCorasick::builder()
                .match_kind(aho_corasick::MatchKind::LeftmostLongest)
                .build(&secrets)
                .ok()
        };
        let masks = secrets.iter().map(|s| mask_token(s)).collect();

        Self {
            matcher,
            masks,
            reveal,
        }
    }

    /// Redactor covering every credential field
    pub fn for_credentials(credentials: &Credentials, reveal: bool) -> Self {
        Self::new(&credentials.sensitive_values(), reveal)
    }

    pub fn reveals(&self) -> bool {
        self.reveal
    }

    /// Mask every known secret and every OAuth token field in `text`
    pub fn redact(&self, text: &str) -> String {
        if self.reveal {
            return text.to_string();
        }

        let masked = match &self.matcher {
            Some(matcher) => matcher.replace_all(text, &self.masks),
            None => text.to_string(),
        };

        TOKEN_FIELD
            .replace_all(&masked, |caps: &regex::Captures<'_>| {
                format!(r#""{}":"{}""#, &caps[1], mask_token(&caps[2]))
            })
            .into_owned()
    }
}
