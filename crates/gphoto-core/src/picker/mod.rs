//! Google Photos Picker API client.
//!
//! One session per invocation: create it, let the user pick in the browser,
//! poll until `mediaItemsSet`, then list the selection. Nothing is retried.

mod types;

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use types::{MediaFile, MediaFileMetadata, MediaItem, PhotoMetadata, PickerSession};
use types::MediaItemsPage;

use crate::error::{Error, Result};
use crate::wait::{self, WaitOutcome};

pub const PICKER_API_BASE_URL: &str = "https://photospicker.googleapis.com";

/// Polling cadence for [`PickerClient::wait_for_selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(10 * 60),
        }
    }
}

pub struct PickerClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl PickerClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: PICKER_API_BASE_URL.to_string(),
            access_token: access_token.into(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Creates a new picker session.
    ///
    /// # Errors
    /// Returns [`Error::Api`] on a non-success response.
    pub async fn create_session(&self) -> Result<PickerSession> {
        let url = format!("{}/v1/sessions", self.base_url);
        tracing::debug!(%url, "creating picker session");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let session: PickerSession = decode(response).await?;
        let session = session.normalize();
        tracing::info!(session = %session.name, "picker session created");
        Ok(session)
    }

    /// Reads the current state of a session.
    ///
    /// # Errors
    /// Returns [`Error::Api`] on a non-success response.
    pub async fn get_session(&self, name: &str) -> Result<PickerSession> {
        let url = format!("{}/v1/{name}", self.base_url);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let session: PickerSession = decode(response).await?;
        Ok(session.normalize())
    }

    /// Polls the session until the user has finished picking.
    ///
    /// # Errors
    /// - [`Error::SelectionTimeout`] if `settings.timeout` elapses first
    /// - [`Error::Cancelled`] if `cancel` fires
    /// - any error from reading the session
    pub async fn wait_for_selection(
        &self,
        name: &str,
        settings: &PollSettings,
        cancel: &CancellationToken,
    ) -> Result<PickerSession> {
        poll_selection(|| self.get_session(name), settings, cancel).await
    }

    /// Lists the picked items, following pagination, in server order.
    ///
    /// # Errors
    /// Returns [`Error::Api`] on a non-success response.
    pub async fn list_media_items(&self, name: &str) -> Result<Vec<MediaItem>> {
        let session_id = name.strip_prefix("sessions/").unwrap_or(name);
        let url = format!("{}/v1/mediaItems", self.base_url);

        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("sessionId", session_id)];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&query)
                .send()
                .await?;
            let page: MediaItemsPage = decode(response).await?;
            items.extend(page.media_items);

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::info!(count = items.len(), "listed picked media items");
        Ok(items)
    }
}

/// Drives the Waiting/Done state machine over an arbitrary session fetch.
///
/// The first fetch happens one `interval` after the call.
pub async fn poll_selection<F, Fut>(
    mut fetch: F,
    settings: &PollSettings,
    cancel: &CancellationToken,
) -> Result<PickerSession>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PickerSession>>,
{
    let polling = async {
        let start = Instant::now() + settings.interval;
        let mut ticker = tokio::time::interval_at(start, settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let session = fetch().await?;
            if session.media_items_set {
                return Ok(session);
            }
            tracing::debug!(session = %session.name, "selection not finished yet");
        }
    };

    match wait::bounded(polling, settings.timeout, cancel).await {
        WaitOutcome::Success(result) => {
            if result.is_ok() {
                tracing::info!("photo selection finished");
            }
            result
        }
        WaitOutcome::Timeout => Err(Error::SelectionTimeout),
        WaitOutcome::Cancelled => Err(Error::Cancelled),
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::from_response(response).await);
    }

    let body = response.text().await?;
    tracing::debug!(%status, %body, "picker response");
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn session(done: bool) -> PickerSession {
        PickerSession {
            name: "sessions/s1".to_string(),
            id: "s1".to_string(),
            picker_uri: String::new(),
            media_items_set: done,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_when_items_are_set() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let started = Instant::now();

        let result = poll_selection(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(session(n >= 2)) }
            },
            &PollSettings::default(),
            &CancellationToken::new(),
        )
        .await;

        assert!(result.unwrap().media_items_set);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_after_ten_minutes() {
        let started = Instant::now();
        let result = poll_selection(
            || async { Ok(session(false)) },
            &PollSettings::default(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(Error::SelectionTimeout)));
        assert_eq!(started.elapsed(), Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_cancels_immediately() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = poll_selection(
            || async { Ok(session(false)) },
            &PollSettings::default(),
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_propagates_fetch_errors() {
        let result = poll_selection(
            || async {
                Err(Error::Api {
                    status: 500,
                    body: "boom".to_string(),
                })
            },
            &PollSettings::default(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(Error::Api { status: 500, .. })));
    }
}
