use crate::types;
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use types::events::server::ServerMessage;
use types::{Base64EncodedAudioBytes, ServerEvent, Setup};

mod config;
mod consts;
mod stats;
mod utils;

pub use config::{Config, ConfigBuilder};
pub use stats::Stats;

type ClientTx = tokio::sync::mpsc::Sender<Outbound>;
type ServerTx = tokio::sync::broadcast::Sender<ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<ServerEvent>;

/// What the writer task is asked to put on the socket.
enum Outbound {
    Event(types::ClientEvent),
    Close,
}

// Holds the channel capacity, the writer/broadcast transmitters, the configuration,
// and usage stats guarded by a Mutex.
pub struct Client {
    capacity: usize,
    config: Config,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    fn new(capacity: usize, config: Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_tx: None,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        let request = utils::build_request(&self.config)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        tracing::info!("connected to Live API, model={}", self.config.model());

        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel(self.capacity);
        let (s_tx, _) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx);
        self.s_tx = Some(s_tx.clone());

        // Writer: serializes outbound events until the channel closes or a close is requested.
        tokio::spawn(async move {
            while let Some(outbound) = c_rx.recv().await {
                match outbound {
                    Outbound::Event(event) => match serde_json::to_string(&event) {
                        Ok(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                tracing::error!("failed to send message: {}", e);
                            }
                        }
                        Err(e) => {
                            tracing::error!("failed to serialize event: {}", e);
                        }
                    },
                    Outbound::Close => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        };
                        if let Err(e) = write.send(Message::Close(Some(frame))).await {
                            tracing::debug!("failed to send close frame: {}", e);
                        }
                        break;
                    }
                }
            }
        });

        let stats = self.stats.clone();
        // Reader: turns every frame into zero or more `ServerEvent`s and broadcasts them.
        // The Live API delivers JSON in binary frames as often as in text frames.
        tokio::spawn(async move {
            let mut closed = false;
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        let _ = s_tx.send(ServerEvent::Error {
                            message: e.to_string(),
                        });
                        break;
                    }
                    Ok(message) => message,
                };
                let payload = match message {
                    Message::Text(text) => text,
                    Message::Binary(bin) => match String::from_utf8(bin) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("dropping non utf-8 binary frame: {}", e);
                            continue;
                        }
                    },
                    Message::Close(frame) => {
                        tracing::info!("connection closed: {:?}", frame);
                        if let Err(e) = s_tx.send(close_event(frame)) {
                            tracing::debug!("no subscriber for close event: {}", e);
                        }
                        closed = true;
                        break;
                    }
                    _ => continue,
                };

                if let Ok(mut stats_guard) = stats.lock() {
                    stats_guard.record_message();
                }
                match parse_frame(&payload) {
                    Ok(events) => {
                        for event in events {
                            if let ServerEvent::Usage(usage) = &event {
                                if let Ok(mut stats_guard) = stats.lock() {
                                    stats_guard.update_usage(
                                        usage.total_token_count,
                                        usage.prompt_token_count,
                                        usage.response_token_count,
                                    );
                                }
                            }
                            if let Err(e) = s_tx.send(event) {
                                tracing::debug!("no subscriber for event: {}", e);
                            }
                        }
                    }
                    // Frames that are not JSON at all are skipped on purpose; they never
                    // reach the session and are not a processing failure. Unknown fields
                    // are ignored, so new message kinds parse to no events.
                    Err(e) => {
                        tracing::error!("failed to deserialize message: {}, text=> {:?}", e, payload);
                    }
                }
            }
            if !closed {
                let _ = s_tx.send(ServerEvent::Close {
                    code: None,
                    reason: None,
                    clean: false,
                });
            }
        });
        Ok(())
    }

    // Get a receiver for server events. Subscribe before sending the setup message
    // so `SetupComplete` is not missed.
    pub fn server_events(&self) -> Result<ServerRx> {
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    pub fn stats(&self) -> Result<Stats> {
        if let Ok(stats_guard) = self.stats.lock() {
            Ok(stats_guard.clone())
        } else {
            Err(anyhow::anyhow!("failed to get stats"))
        }
    }

    async fn send_outbound(&self, outbound: Outbound) -> Result<()> {
        match self.c_tx {
            Some(ref tx) => {
                tx.send(outbound)
                    .await
                    .map_err(|_| anyhow::anyhow!("connection writer has stopped"))?;
                Ok(())
            }
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    /// Sends the session setup. Must be the first message on the socket.
    pub async fn send_setup(&self, setup: Setup) -> Result<()> {
        self.send_outbound(Outbound::Event(types::ClientEvent::Setup(setup)))
            .await
    }

    /// Streams one chunk of base64 encoded media.
    pub async fn send_realtime_input(
        &self,
        audio: Base64EncodedAudioBytes,
        mime_type: &str,
    ) -> Result<()> {
        let event = types::ClientEvent::RealtimeInput(
            types::events::client::RealtimeInputEvent::new(audio, mime_type),
        );
        self.send_outbound(Outbound::Event(event)).await
    }

    /// Requests an orderly close. Further sends fail.
    pub async fn close(&mut self) -> Result<()> {
        let result = self.send_outbound(Outbound::Close).await;
        self.c_tx = None;
        result
    }
}

fn parse_frame(payload: &str) -> serde_json::Result<Vec<ServerEvent>> {
    Ok(serde_json::from_str::<ServerMessage>(payload)?.into_events())
}

fn close_event(frame: Option<CloseFrame<'_>>) -> ServerEvent {
    let code = frame.as_ref().map(|f| u16::from(f.code));
    ServerEvent::Close {
        code,
        reason: frame
            .map(|f| f.reason.to_string())
            .filter(|reason| !reason.is_empty()),
        clean: code == Some(consts::NORMAL_CLOSE_CODE),
    }
}

// Create a client with a specific config and connect.
pub async fn connect_with_config(capacity: usize, config: Config) -> Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}

// Connect with default settings.
pub async fn connect() -> Result<Client> {
    connect_with_config(1024, Config::new()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_close_is_clean() {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        assert!(matches!(
            close_event(Some(frame)),
            ServerEvent::Close { code: Some(1000), reason: None, clean: true }
        ));
    }

    #[test]
    fn abnormal_or_missing_close_frame_is_unclean() {
        let frame = CloseFrame {
            code: CloseCode::Policy,
            reason: "quota exceeded".into(),
        };
        match close_event(Some(frame)) {
            ServerEvent::Close { code, reason, clean } => {
                assert_eq!(code, Some(1008));
                assert_eq!(reason.as_deref(), Some("quota exceeded"));
                assert!(!clean);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(close_event(None), ServerEvent::Close { clean: false, .. }));
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame("{}").unwrap().is_empty());
        assert!(parse_frame(r#"{"toolCall":{"functionCalls":[]}}"#).unwrap().is_empty());
    }

    #[tokio::test]
    async fn sending_before_connect_fails() {
        let client = Client::new(8, Config::builder().with_api_key("k").build());
        assert!(client.send_realtime_input("AAA=".into(), "audio/pcm;rate=16000").await.is_err());
        assert!(client.server_events().is_err());
    }
}
