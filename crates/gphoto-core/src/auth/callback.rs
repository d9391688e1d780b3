//! Loopback listener for the OAuth redirect.
//!
//! The accept loop runs in its own task and serves each connection in a task
//! of its own, so an idle browser preconnect cannot stall the redirect. The
//! first valid callback hands its code to the waiter over a oneshot channel;
//! anything after that is answered but ignored. Bad requests (wrong path,
//! wrong state, no code) are rejected individually and the listener keeps
//! waiting.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_REDIRECT_URI;
use crate::error::Result;

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REQUEST_BYTES: usize = 8 * 1024;

/// Where the loopback listener binds, derived from the configured redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTarget {
    pub addr: SocketAddr,
    pub path: String,
    redirect: url::Url,
    configured: String,
}

impl CallbackTarget {
    /// Derives the listener address and path from a loopback redirect URI.
    ///
    /// Non-HTTP or non-loopback redirect URIs (e.g. the OOB URN) fall back to
    /// `http://localhost:8080/auth/callback`.
    pub fn from_redirect_uri(redirect_uri: &str) -> Self {
        if let Some(target) = Self::parse(redirect_uri) {
            return target;
        }

        tracing::warn!(
            redirect_uri,
            "redirect URI is not a loopback HTTP address, using {DEFAULT_REDIRECT_URI}"
        );
        Self::parse(DEFAULT_REDIRECT_URI).expect("default redirect URI is a loopback URL")
    }

    fn parse(redirect_uri: &str) -> Option<Self> {
        let redirect = url::Url::parse(redirect_uri).ok()?;
        if redirect.scheme() != "http" {
            return None;
        }

        let ip = match redirect.host()? {
            url::Host::Domain(domain) if domain.eq_ignore_ascii_case("localhost") => {
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            }
            url::Host::Ipv4(ip) if ip.is_loopback() => IpAddr::V4(ip),
            url::Host::Ipv6(ip) if ip.is_loopback() => IpAddr::V6(ip),
            _ => return None,
        };

        let port = redirect.port_or_known_default()?;
        let path = redirect.path().to_string();

        Some(Self {
            addr: SocketAddr::new(ip, port),
            path,
            redirect,
            configured: redirect_uri.to_string(),
        })
    }

    /// Redirect URI for the port the listener actually bound.
    ///
    /// The configured string is returned verbatim when the port is unchanged,
    /// since the provider compares it byte for byte.
    pub fn redirect_uri(&self, bound_port: u16) -> String {
        if bound_port == self.addr.port() {
            return self.configured.clone();
        }
        let mut redirect = self.redirect.clone();
        // Only fails for cannot-be-a-base URLs, which parse() already excluded.
        let _ = redirect.set_port(Some(bound_port));
        redirect.to_string()
    }
}

/// A running loopback listener.
pub struct CallbackServer {
    local_addr: SocketAddr,
    code_rx: oneshot::Receiver<String>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl CallbackServer {
    /// Binds the listener and starts accepting callbacks in the background.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound (e.g. port in use).
    pub async fn bind(target: &CallbackTarget, expected_state: &str) -> Result<Self> {
        let listener = TcpListener::bind(target.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::debug!(%local_addr, path = %target.path, "OAuth callback listener started");

        let (code_tx, code_rx) = oneshot::channel();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            listener,
            target.path.clone(),
            expected_state.to_string(),
            code_tx,
            shutdown.clone(),
        ));

        Ok(Self {
            local_addr,
            code_rx,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the first valid authorization code.
    ///
    /// Returns `None` if the listener stopped before delivering one.
    pub async fn code(&mut self) -> Option<String> {
        (&mut self.code_rx).await.ok()
    }

    /// Stops accepting and waits up to `grace` for an in-flight request.
    pub async fn shutdown(self, grace: Duration) {
        self.shutdown.cancel();
        let abort = self.task.abort_handle();
        if tokio::time::timeout(grace, self.task).await.is_err() {
            tracing::warn!("OAuth callback listener did not stop in time, aborting");
            abort.abort();
        }
        tracing::debug!(local_addr = %self.local_addr, "OAuth callback listener stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    callback_path: String,
    expected_state: String,
    code_tx: oneshot::Sender<String>,
    shutdown: CancellationToken,
) {
    let mut handoff = Some(code_tx);
    // Dropped on exit, which aborts connections still being served.
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((mut stream, peer)) => {
                    let path = callback_path.clone();
                    let state = expected_state.clone();
                    connections.spawn(async move {
                        let served = handle_connection(&mut stream, &path, &state).await;
                        (peer, served)
                    });
                }
                Err(err) => {
                    // Dropping the sender tells the waiter to stop waiting.
                    tracing::warn!(error = %err, "OAuth callback listener failed");
                    break;
                }
            },
            Some(joined) = connections.join_next() => match joined {
                Ok((peer, Ok(Some(code)))) => match handoff.take() {
                    Some(tx) => {
                        tracing::info!(%peer, "received authorization code");
                        let _ = tx.send(code);
                    }
                    None => tracing::debug!(%peer, "ignoring repeated OAuth callback"),
                },
                Ok((_, Ok(None))) => {}
                Ok((peer, Err(err))) => {
                    tracing::debug!(%peer, error = %err, "OAuth callback connection failed");
                }
                Err(err) => tracing::debug!(error = %err, "OAuth callback connection task failed"),
            },
        }
    }
}

/// Serves one connection; returns the code if the request was a valid callback.
async fn handle_connection(
    stream: &mut TcpStream,
    callback_path: &str,
    expected_state: &str,
) -> std::io::Result<Option<String>> {
    let request = tokio::time::timeout(READ_TIMEOUT, read_request(stream))
        .await
        .map_err(|_elapsed| std::io::Error::from(std::io::ErrorKind::TimedOut))??;

    let (response, code) = match check_callback(&request, callback_path, expected_state) {
        Ok(code) => (oauth_success_response(), Some(code)),
        Err(rejection) => {
            tracing::warn!(reason = %rejection.message(), "rejected OAuth callback request");
            (oauth_error_response(&rejection), None)
        }
    };

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(code)
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Why a callback request was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    Malformed,
    NotFound,
    StateMismatch,
    Denied(String),
    MissingCode,
}

impl Rejection {
    fn status_line(&self) -> &'static str {
        match self {
            Rejection::NotFound => "404 Not Found",
            _ => "400 Bad Request",
        }
    }

    fn message(&self) -> String {
        match self {
            Rejection::Malformed => "Bad request".to_string(),
            Rejection::NotFound => "Not found".to_string(),
            Rejection::StateMismatch => "State mismatch".to_string(),
            Rejection::Denied(reason) => format!("Authorization denied: {reason}"),
            Rejection::MissingCode => "No code in request".to_string(),
        }
    }
}

fn check_callback(
    request: &str,
    callback_path: &str,
    expected_state: &str,
) -> Result<String, Rejection> {
    let request_line = request.lines().next().ok_or(Rejection::Malformed)?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next().ok_or(Rejection::Malformed)?;
    let target = parts.next().ok_or(Rejection::Malformed)?;

    let url = url::Url::parse(&format!("http://localhost{target}"))
        .map_err(|_parse_error| Rejection::Malformed)?;
    if url.path() != callback_path {
        return Err(Rejection::NotFound);
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    if param("state").as_deref() != Some(expected_state) {
        return Err(Rejection::StateMismatch);
    }
    if let Some(error) = param("error") {
        return Err(Rejection::Denied(error));
    }

    param("code")
        .filter(|code| !code.is_empty())
        .ok_or(Rejection::MissingCode)
}

fn oauth_success_response() -> String {
    let body = "<!doctype html><html><head><meta charset=\"utf-8\" /><title>Authentication complete</title></head><body><h1>Authentication complete</h1><p>You can close this tab and return to the terminal.</p></body></html>";
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn oauth_error_response(rejection: &Rejection) -> String {
    let body = rejection.message();
    format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        rejection.status_line(),
        body.len(),
        body
    )
}
