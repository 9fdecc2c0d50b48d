//! Session-scoped operations: the four calls the bridge makes on behalf of
//! one IRC connection, each a single routed request.

use bytes::Bytes;
use reqwest::{Method, Response};

use super::router::{Router, RouterError};
use super::wire::{DeleteRequest, SessionReply};

const API_BASE: &str = "/robustirc/v1";

/// A cluster-issued session: the identity one IRC connection acts under.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque session identifier, substituted into request paths.
    pub id: String,
    /// IRC prefix issued by the cluster, used for locally synthesized frames.
    pub prefix: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error("malformed session reply: {0}")]
    Reply(#[source] reqwest::Error),
    #[error("could not encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Thin wrapper over the router for the session API.
#[derive(Debug, Clone)]
pub struct SessionClient {
    router: Router,
}

impl SessionClient {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// `POST /robustirc/v1/session` — create a session for a freshly
    /// accepted IRC connection.
    pub async fn create(&self) -> Result<Session, SessionError> {
        let (_, resp) = self
            .router
            .send(Method::POST, &format!("{API_BASE}/session"), Bytes::new())
            .await?;
        let reply: SessionReply = resp.json().await.map_err(SessionError::Reply)?;
        Ok(Session {
            id: reply.sessionid,
            prefix: reply.prefix,
        })
    }

    /// `DELETE /robustirc/v1/{sid}` — release the session, carrying the quit
    /// message. The response body is discarded.
    pub async fn delete(&self, sessionid: &str, quitmessage: &str) -> Result<(), SessionError> {
        let body = serde_json::to_vec(&DeleteRequest {
            quitmessage: quitmessage.to_owned(),
        })?;
        self.router
            .send(
                Method::DELETE,
                &format!("{API_BASE}/{sessionid}"),
                Bytes::from(body),
            )
            .await?;
        Ok(())
    }

    /// `POST /robustirc/v1/{sid}/message` — post one raw IRC line. The
    /// response body is dropped unread.
    pub async fn post(&self, sessionid: &str, raw: String) -> Result<(), SessionError> {
        self.router
            .send(
                Method::POST,
                &format!("{API_BASE}/{sessionid}/message"),
                Bytes::from(raw),
            )
            .await?;
        Ok(())
    }

    /// `GET /robustirc/v1/{sid}/messages?lastseen={id}` — open the message
    /// stream. Returns the responding endpoint and the open response; the
    /// caller reads JSON objects from the body until it closes it.
    pub async fn stream(
        &self,
        sessionid: &str,
        last_seen: u64,
    ) -> Result<(String, Response), SessionError> {
        let (endpoint, resp) = self
            .router
            .send(
                Method::GET,
                &format!("{API_BASE}/{sessionid}/messages?lastseen={last_seen}"),
                Bytes::new(),
            )
            .await?;
        Ok((endpoint, resp))
    }
}
