//! Error taxonomy shared by every core component.

/// Errors produced by the core library.
///
/// Single-request failures (one bad callback, one failed download) are
/// absorbed by the components; the variants here are what reaches callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or unusable OAuth client configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The loopback callback did not arrive in time.
    #[error("timed out waiting for the OAuth callback")]
    AuthTimeout,

    /// The token endpoint rejected the authorization code or refresh token.
    #[error("token exchange failed (HTTP {status}): {body}")]
    AuthExchange { status: u16, body: String },

    /// The manual flow ended without a code being entered.
    #[error("no authorization code was entered")]
    MissingAuthCode,

    /// No usable credential on disk (absent or unreadable).
    #[error("no saved credential")]
    TokenNotFound,

    /// The user did not finish selecting photos in time.
    #[error("timed out waiting for photo selection")]
    SelectionTimeout,

    /// An external cancellation signal (Ctrl-C) interrupted a wait.
    #[error("operation cancelled")]
    Cancelled,

    /// Non-success response from a remote API.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Builds an [`Error::Api`] from a failed response, consuming its body.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Error::Api { status, body }
    }

    /// Returns true for errors that end the flow because of a user interrupt.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns the next step the user should take, if there is an obvious one.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::Configuration(_) => {
                Some("Run `gphoto setup` to configure Google OAuth credentials.")
            }
            Error::AuthExchange { .. } | Error::MissingAuthCode => {
                Some("Run `gphoto login` to authenticate again.")
            }
            Error::Api { status: 401 | 403, .. } => {
                Some("The saved credential was rejected. Run `gphoto logout` and try again.")
            }
            Error::SelectionTimeout => {
                Some("Run the command again and finish selecting photos within 10 minutes.")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_points_to_setup() {
        let err = Error::Configuration("client id is empty".to_string());
        assert!(err.hint().unwrap().contains("gphoto setup"));
    }

    #[test]
    fn test_unauthorized_api_error_points_to_logout() {
        let err = Error::Api {
            status: 401,
            body: "{}".to_string(),
        };
        assert!(err.hint().unwrap().contains("logout"));
        assert!(
            Error::Api {
                status: 500,
                body: String::new()
            }
            .hint()
            .is_none()
        );
    }

    #[test]
    fn test_api_error_display_carries_status_and_body() {
        let err = Error::Api {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "API error 404: not found");
    }
}
