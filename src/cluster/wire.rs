//! Wire types for the cluster's HTTP/JSON API.
//!
//! Field names follow the cluster protocol exactly (`Sessionid`, `Prefix`,
//! `Quitmessage`, `Id`, `Type`, `Data`, `Servers`, `Currentmaster`).

use serde::{Deserialize, Deserializer, Serialize};

/// Reply to `POST /robustirc/v1/session`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionReply {
    #[serde(rename = "Sessionid")]
    pub sessionid: String,
    #[serde(rename = "Prefix")]
    pub prefix: String,
}

/// Body of `DELETE /robustirc/v1/{sessionid}`.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteRequest {
    #[serde(rename = "Quitmessage")]
    pub quitmessage: String,
}

/// The closed set of message types the bridge acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Membership/liveness control frame; never forwarded to the client.
    Ping,
    /// An opaque IRC wire line destined for the client.
    IrcToClient,
}

/// One object on the session message stream.
///
/// Ids are monotonic per session and drive `lastseen` resumption. An
/// unrecognized `Type` tag decodes to `kind: None` rather than failing the
/// stream.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterMessage {
    #[serde(rename = "Id")]
    pub id: u64,
    #[serde(rename = "Type", default, deserialize_with = "kind_from_tag")]
    pub kind: Option<MessageKind>,
    #[serde(rename = "Data", default)]
    pub data: Option<String>,
    #[serde(rename = "Servers", default)]
    pub servers: Option<Vec<String>>,
    #[serde(rename = "Currentmaster", default)]
    pub current_master: Option<String>,
}

fn kind_from_tag<'de, D>(deserializer: D) -> Result<Option<MessageKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let tag = String::deserialize(deserializer)?;
    Ok(match tag.as_str() {
        "Ping" => Some(MessageKind::Ping),
        "IRCToClient" => Some(MessageKind::IrcToClient),
        _ => None,
    })
}
