//! OAuth2 credential acquisition and storage for the Google Photos Picker API.
//!
//! - [`TokenStore`]: the credential file (`token.json`, 0600)
//! - [`AuthFlowEngine`]: loopback callback or manual code entry, with fallback
//! - [`CallbackServer`]: the short-lived local HTTP listener used by the loopback flow

mod callback;
mod console;
mod flow;
mod store;

use std::time::Duration;

pub use callback::{CallbackServer, CallbackTarget};
pub use console::Console;
pub use flow::AuthFlowEngine;
pub use store::{Credential, TokenStore};

/// Google OAuth authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// How long the loopback flow waits for the browser redirect.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// How the authorization code reaches us.
///
/// `LocalServer` may fall back to `ManualCode` within one attempt, never the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Browser redirects to a loopback HTTP listener.
    LocalServer,
    /// User pastes the code shown by Google into the terminal.
    ManualCode,
}

/// OAuth client settings for one acquisition attempt.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    pub method: AuthMethod,
    /// Authorization endpoint (overridable for tests)
    pub auth_url: String,
    /// Token endpoint (overridable for tests)
    pub token_url: String,
    pub callback_timeout: Duration,
    /// Try to open the authorization URL in the default browser
    pub open_browser: bool,
}

impl AuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
        method: AuthMethod,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
            method,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            callback_timeout: CALLBACK_TIMEOUT,
            open_browser: true,
        }
    }

    /// Builds the authorization URL for `state` and `redirect_uri`.
    ///
    /// Requests offline access so Google returns a refresh token.
    pub fn authorization_url(&self, state: &str, redirect_uri: &str) -> String {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", self.scope.as_str()),
            ("state", state),
            ("access_type", "offline"),
        ];

        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();

        let separator = if self.auth_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.auth_url)
    }
}

/// Parses pasted authorization input into code + optional state.
///
/// Accepts a bare code, a full redirect URL, or a `code=...&state=...` query.
pub fn parse_authorization_input(input: &str) -> (Option<String>, Option<String>) {
    let value = input.trim();
    if value.is_empty() {
        return (None, None);
    }

    if let Ok(url) = url::Url::parse(value)
        && url.query().is_some()
    {
        let code = url.query_pairs().find(|(k, _)| k == "code").map(|(_, v)| v);
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v);
        return (
            code.map(|v| v.to_string()).filter(|v| !v.is_empty()),
            state.map(|v| v.to_string()),
        );
    }

    if value.contains("code=") {
        let params = url::form_urlencoded::parse(value.as_bytes()).collect::<Vec<_>>();
        let code = params.iter().find(|(k, _)| k == "code").map(|(_, v)| v);
        let state = params.iter().find(|(k, _)| k == "state").map(|(_, v)| v);
        return (
            code.map(std::string::ToString::to_string)
                .filter(|v| !v.is_empty()),
            state.map(std::string::ToString::to_string),
        );
    }

    (Some(value.to_string()), None)
}

/// Masks a token for display (never log or print tokens in full).
pub fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    if token.chars().count() <= 8 {
        return "*".repeat(token.chars().count());
    }
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new(
            "client-1.apps.googleusercontent.com",
            "shh",
            "http://localhost:8080/auth/callback",
            "https://www.googleapis.com/auth/photospicker.mediaitems.readonly",
            AuthMethod::LocalServer,
        )
    }

    #[test]
    fn test_auth_url_format() {
        let config = config();
        let url = config.authorization_url("state-abc", &config.redirect_uri);

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(url.contains("client_id=client-1.apps.googleusercontent.com"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fcallback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=state-abc"));
        assert!(url.contains("access_type=offline"));
        assert!(!url.contains("shh"));
    }

    #[test]
    fn test_parse_bare_code() {
        let (code, state) = parse_authorization_input("  4/0Abc-xyz \n");
        assert_eq!(code.as_deref(), Some("4/0Abc-xyz"));
        assert_eq!(state, None);
    }

    #[test]
    fn test_parse_redirect_url() {
        let (code, state) = parse_authorization_input(
            "http://localhost:8080/auth/callback?state=s1&code=4%2F0Abc&scope=x",
        );
        assert_eq!(code.as_deref(), Some("4/0Abc"));
        assert_eq!(state.as_deref(), Some("s1"));
    }

    #[test]
    fn test_parse_query_fragment() {
        let (code, state) = parse_authorization_input("code=abc&state=def");
        assert_eq!(code.as_deref(), Some("abc"));
        assert_eq!(state.as_deref(), Some("def"));
    }

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(parse_authorization_input("   "), (None, None));
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("ya29.a0AfH6SMB-long-token"), "ya29.a0A...");
        assert_eq!(mask_token("short"), "*****");
    }
}
