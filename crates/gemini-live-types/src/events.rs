pub mod client;
pub mod server;

use crate::setup::Setup;

/// Messages the client sends over the socket. Serialized externally tagged, so
/// `ClientEvent::Setup(..)` goes out as `{"setup": {..}}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientEvent {
    Setup(Setup),
    RealtimeInput(client::RealtimeInputEvent),
}

/// Everything the client surfaces to subscribers. Wire messages are split into
/// one event per populated field; `Close` and `Error` are synthesized by the
/// client from the socket itself.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    SetupComplete,
    ServerContent(server::ServerContent),
    Usage(server::UsageMetadata),
    GoAway(server::GoAway),
    Close {
        code: Option<u16>,
        reason: Option<String>,
        clean: bool,
    },
    Error {
        message: String,
    },
}
