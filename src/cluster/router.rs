//! Cluster request router.
//!
//! Sends one logical request against the cluster: iterates candidates from
//! the registry (sleeping out back-off when nothing is eligible), follows
//! 307 redirects by hand, and returns the first 200 with its body unread.
//! There is no attempt cap; abandoning the call (the IRC connection going
//! away) is the only exit for a pathologically unavailable cluster.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Method, Response, StatusCode};
use tracing::{debug, warn};

use super::registry::{Pick, ServerRegistry};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that end a routed request for good. Transport failures and error
/// statuses are handled internally with back-off and rotation; only protocol
/// contract violations surface.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    #[error("redirect from {endpoint} carries no Location header")]
    MissingLocation { endpoint: String },
    #[error("could not parse redirect target {location:?}")]
    BadLocation { location: String },
}

/// Cluster-aware HTTP client. Cheap to clone; all clones share the
/// underlying connection pool and registry.
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<ServerRegistry>,
    http: reqwest::Client,
}

impl Router {
    /// Build a router over the given registry. Redirect-following is
    /// disabled on the client: 307s carry leadership hints the router must
    /// see for itself.
    pub fn new(registry: Arc<ServerRegistry>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { registry, http })
    }

    /// Send one logical request against the cluster. Returns the responding
    /// endpoint and the 200 response with its body left for the caller.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
    ) -> Result<(String, Response), RouterError> {
        let mut candidates = self.registry.candidates();

        loop {
            let endpoint = loop {
                match self.registry.next_eligible(&candidates) {
                    Pick::Endpoint(endpoint) => break endpoint,
                    Pick::Wait(wait) => {
                        debug!(?wait, "waiting for back-off to expire");
                        tokio::time::sleep(wait).await;
                    }
                }
            };

            let url = format!("http://{endpoint}{path}");
            debug!(%endpoint, %method, %path, "trying candidate");

            let result = self
                .http
                .request(method.clone(), url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await;

            let resp = match result {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(%endpoint, "cluster request failed: {e}");
                    self.registry.mark_failed(&endpoint);
                    continue;
                }
            };

            let status = resp.status();

            if status == StatusCode::TEMPORARY_REDIRECT {
                let location = resp
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                // Dropping the response closes its body.
                drop(resp);

                let Some(location) = location else {
                    return Err(RouterError::MissingLocation { endpoint });
                };
                let Some(target) = redirect_target(&location) else {
                    return Err(RouterError::BadLocation { location });
                };

                debug!(%endpoint, %target, "redirected");
                // The endpoint did not fail, but it did not answer either;
                // back it off so we do not hammer it.
                self.registry.mark_failed(&endpoint);
                candidates.insert(0, target);
                continue;
            }

            if status != StatusCode::OK {
                let detail = resp.text().await.unwrap_or_default();
                warn!(%endpoint, %status, "cluster returned an error: {}", detail.trim());
                self.registry.mark_failed(&endpoint);
                continue;
            }

            self.registry.mark_success(&endpoint);
            return Ok((endpoint, resp));
        }
    }
}

/// Extract the `host:port` target of a redirect Location.
fn redirect_target(location: &str) -> Option<String> {
    let url = reqwest::Url::parse(location).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}
