//! OAuth2 refresh-token exchange
//!
//! https://developers.google.com/identity/protocols/oauth2/web-server#offline

use crate::core::error::StoreError;
use crate::core::traits::{AccessToken, TokenResponse};
use crate::security::Credentials;
use crate::store::http::StoreHttp;
use reqwest::Method;
use serde::Serialize;
use tracing::{debug, info};

const GRANT_TYPE: &str = "refresh_token";

#[derive(Serialize)]
struct RefreshRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
    grant_type: &'a str,
}

/// Exchanges a refresh credential for a short-lived bearer token
pub struct TokenExchanger<'a> {
    http: &'a StoreHttp,
}

impl<'a> TokenExchanger<'a> {
    pub fn new(http: &'a StoreHttp) -> Self {
        Self { http }
    }

    /// Any failure, transport or HTTP, is reported as [`StoreError::Auth`]
    pub async fn exchange(&self, credentials: &Credentials) -> Result<AccessToken, StoreError> {
        info!("Start to refresh access token.");

        let store = self.http.store_name().to_string();
        let auth_error = |status: Option<u16>, body: String| StoreError::Auth {
            store: store.clone(),
            status,
            body,
        };

        let url = self.http.backend().token_endpoint()?;
        let builder = self.http.request(Method::POST, url).json(&RefreshRequest {
            client_id: credentials.client_id(),
            client_secret: credentials.client_secret(),
            refresh_token: credentials.refresh_token(),
            grant_type: GRANT_TYPE,
        });

        let response = self
            .http
            .execute("token", builder)
            .await
            .map_err(|e| {
                auth_error(
                    e.status().map(|s| s.as_u16()),
                    self.http.redactor().redact(&e.to_string()),
                )
            })?;

        if !response.is_success() {
            return Err(auth_error(
                Some(response.status),
                self.http.redactor().redact(&response.body),
            ));
        }

        let token_response: TokenResponse = self.http.parse("token", &response.body)?;
        if token_response.access_token.is_empty() {
            return Err(auth_error(
                Some(response.status),
                "token endpoint returned an empty access_token".to_string(),
            ));
        }

        let redactor = self.http.redactor();
        if redactor.reveals() {
            debug!("Got access token: {}", token_response.access_token);
        }

        info!("Access token refreshed.");

        Ok(AccessToken::from(token_response))
    }
}
