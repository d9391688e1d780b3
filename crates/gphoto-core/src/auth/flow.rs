//! Interactive credential acquisition.
//!
//! `LocalServer`: bind the loopback listener, show the authorization URL, wait
//! up to three minutes for the redirect, then exchange the code. A timeout (or
//! a listener that cannot start) falls back to `ManualCode`.
//!
//! `ManualCode`: show the authorization URL with the out-of-band redirect and
//! block on the console until a code is pasted.
//!
//! Exchange failures end the attempt; nothing here retries.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::callback::{CallbackServer, CallbackTarget};
use super::console::Console;
use super::store::{Credential, TokenStore};
use super::{AuthConfig, AuthMethod, parse_authorization_input};
use crate::config::OOB_REDIRECT_URI;
use crate::error::{Error, Result};
use crate::wait::{self, WaitOutcome};

/// Grace period for in-flight callback connections after a code arrived.
const SHUTDOWN_GRACE_AFTER_CODE: Duration = Duration::from_secs(5);
/// Grace period when the wait timed out or was cancelled.
const SHUTDOWN_GRACE_AFTER_TIMEOUT: Duration = Duration::from_secs(2);

/// An authorization code together with the redirect URI it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CodeGrant {
    code: String,
    redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Obtains bearer credentials for the Picker API.
pub struct AuthFlowEngine {
    config: AuthConfig,
    http: reqwest::Client,
    console: Console,
}

impl AuthFlowEngine {
    pub fn new(config: AuthConfig) -> Self {
        Self::with_console(config, Console::stdio())
    }

    pub fn with_console(config: AuthConfig, console: Console) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            console,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Returns a usable credential, reusing or refreshing the stored one first.
    ///
    /// Only runs the interactive flow when the store has nothing usable. Newly
    /// acquired or refreshed credentials are saved back to `store`.
    ///
    /// # Errors
    /// Returns an error if acquisition fails or the credential cannot be saved.
    pub async fn authorize(
        &mut self,
        store: &TokenStore,
        cancel: &CancellationToken,
    ) -> Result<Credential> {
        match store.load() {
            Ok(credential) if !credential.is_expired() => {
                tracing::debug!("using stored credential");
                return Ok(credential);
            }
            Ok(credential) => {
                if let Some(refresh_token) = credential.refresh_token.as_deref() {
                    match self.refresh(refresh_token).await {
                        Ok(refreshed) => {
                            store.save(&refreshed)?;
                            return Ok(refreshed);
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "token refresh failed, re-authorizing");
                        }
                    }
                } else {
                    tracing::info!("stored credential expired and has no refresh token");
                }
            }
            Err(Error::TokenNotFound) => tracing::debug!("no stored credential"),
            Err(err) => return Err(err),
        }

        let credential = self.acquire(cancel).await?;
        store.save(&credential)?;
        self.console
            .say(format!("Credential saved to {}", store.path().display()))?;
        Ok(credential)
    }

    /// Runs the configured interactive flow and exchanges the resulting code.
    ///
    /// # Errors
    /// - [`Error::Cancelled`] if `cancel` fires while waiting for the callback
    /// - [`Error::MissingAuthCode`] if the console closes without a code
    /// - [`Error::AuthExchange`] if the token endpoint rejects the code
    pub async fn acquire(&mut self, cancel: &CancellationToken) -> Result<Credential> {
        let grant = match self.config.method {
            AuthMethod::LocalServer => match self.local_server_code(cancel).await {
                Ok(grant) => grant,
                Err(err @ (Error::AuthTimeout | Error::Io(_))) => {
                    tracing::warn!(error = %err, "local callback failed, using manual entry");
                    self.console.say("")?;
                    self.console.say(format!(
                        "Automatic sign-in did not complete ({err}). Switching to manual code entry."
                    ))?;
                    self.manual_code()?
                }
                Err(err) => return Err(err),
            },
            AuthMethod::ManualCode => self.manual_code()?,
        };

        self.console.say("Exchanging authorization code for tokens...")?;
        self.exchange(&grant).await
    }

    async fn local_server_code(&mut self, cancel: &CancellationToken) -> Result<CodeGrant> {
        let target = CallbackTarget::from_redirect_uri(&self.config.redirect_uri);
        let state = uuid::Uuid::new_v4().to_string();
        let mut server = CallbackServer::bind(&target, &state).await?;
        let redirect_uri = target.redirect_uri(server.local_addr().port());
        let auth_url = self.config.authorization_url(&state, &redirect_uri);

        self.console
            .say("Open the following URL in your browser to sign in:")?;
        self.console.say(format!("  {auth_url}"))?;
        self.console.say("")?;
        self.open_browser(&auth_url);
        self.console.say("Waiting for authorization...")?;

        let outcome = wait::bounded(server.code(), self.config.callback_timeout, cancel).await;
        let grace = match outcome {
            WaitOutcome::Success(Some(_)) => SHUTDOWN_GRACE_AFTER_CODE,
            _ => SHUTDOWN_GRACE_AFTER_TIMEOUT,
        };
        server.shutdown(grace).await;

        match outcome {
            WaitOutcome::Success(Some(code)) => {
                self.console.say("Authorization code received.")?;
                Ok(CodeGrant { code, redirect_uri })
            }
            WaitOutcome::Success(None) => Err(Error::Io(std::io::Error::other(
                "OAuth callback listener stopped unexpectedly",
            ))),
            WaitOutcome::Timeout => Err(Error::AuthTimeout),
            WaitOutcome::Cancelled => Err(Error::Cancelled),
        }
    }

    fn manual_code(&mut self) -> Result<CodeGrant> {
        let state = uuid::Uuid::new_v4().to_string();
        let auth_url = self.config.authorization_url(&state, OOB_REDIRECT_URI);

        self.console.say("")?;
        self.console.say("=== Manual sign-in ===")?;
        self.console
            .say("1. Open the following URL in your browser:")?;
        self.console.say(format!("  {auth_url}"))?;
        self.console.say("2. Complete the Google sign-in")?;
        self.console.say("3. Copy the authorization code that is shown")?;
        self.console.say("")?;
        self.open_browser(&auth_url);

        loop {
            let Some(input) = self.console.prompt("Enter the authorization code: ")? else {
                return Err(Error::MissingAuthCode);
            };

            let (code, provided_state) = parse_authorization_input(&input);
            if let Some(provided) = provided_state
                && provided != state
            {
                self.console
                    .say("That URL belongs to a different sign-in attempt (state mismatch).")?;
                continue;
            }

            match code {
                Some(code) => {
                    return Ok(CodeGrant {
                        code,
                        redirect_uri: OOB_REDIRECT_URI.to_string(),
                    });
                }
                None => self.console.say("The authorization code cannot be empty.")?,
            }
        }
    }

    fn open_browser(&self, url: &str) {
        if !self.config.open_browser || std::env::var_os("GPHOTO_NO_BROWSER").is_some() {
            return;
        }
        if let Err(err) = open::that(url) {
            tracing::debug!(error = %err, "could not open browser");
        }
    }

    async fn exchange(&self, grant: &CodeGrant) -> Result<Credential> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", grant.code.as_str()),
            ("redirect_uri", grant.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let token = self.request_token(&params).await?;
        tracing::info!("authorization code exchanged");
        Ok(credential_from_response(token, None))
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// Keeps `refresh_token` when the response does not rotate it.
    ///
    /// # Errors
    /// Returns [`Error::AuthExchange`] if the token endpoint rejects the request.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let token = self.request_token(&params).await?;
        tracing::info!("access token refreshed");
        Ok(credential_from_response(token, Some(refresh_token)))
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
            .map_err(|err| Error::AuthExchange {
                status: 0,
                body: err.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::AuthExchange {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|err| Error::AuthExchange {
                status: status.as_u16(),
                body: format!("invalid token response: {err}"),
            })?;
        if token.access_token.is_empty() {
            return Err(Error::AuthExchange {
                status: status.as_u16(),
                body: "token response has an empty access_token".to_string(),
            });
        }
        Ok(token)
    }
}

fn credential_from_response(token: TokenResponse, previous_refresh: Option<&str>) -> Credential {
    Credential {
        access_token: token.access_token,
        refresh_token: token
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string)),
        expiry: token
            .expires_in
            .map(|secs| Utc::now() + TimeDelta::seconds(secs)),
    }
}
