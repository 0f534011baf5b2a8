use anyhow::{Context, Result};
use async_trait::async_trait;
use gemini_live::types::events::server::ServerContent;
use gemini_live::types::{ServerEvent, Setup, Voice};
use gemini_live::{Client, ServerRx};
use tokio::sync::broadcast::error::RecvError;
use tutor_core::generic_types::{
    InboundMessage, RealtimeInput, ResponseModality, SessionSetup, TransportEvent,
};
use tutor_core::realtime_api::{RealtimeSession, RealtimeTransport};
use tutor_core::session_state::TranscriptMode;
use tutor_core::sink::TransportSink;

const CHANNEL_CAPACITY: usize = 1024;

/// Gemini Live streams `inputTranscription` and `outputTranscription` as
/// incremental chunks, so fragments have to be appended.
pub const TRANSCRIPT_MODE: TranscriptMode = TranscriptMode::Delta;

/// Implements the generic `RealtimeTransport` trait on top of `gemini_live::Client`.
pub struct GeminiLiveTransport {
    api_key: String,
    model: String,
}

impl GeminiLiveTransport {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl RealtimeTransport for GeminiLiveTransport {
    async fn connect(
        &self,
        setup: SessionSetup,
        sink: TransportSink,
    ) -> Result<Box<dyn RealtimeSession>> {
        let config = gemini_live::Config::builder()
            .with_api_key(&self.api_key)
            .with_model(&self.model)
            .build();
        let client = gemini_live::connect_with_config(CHANNEL_CAPACITY, config)
            .await
            .context("Failed to connect to the Live API")?;

        // Subscribe before the setup goes out so `setupComplete` cannot be missed.
        let events = client
            .server_events()
            .context("Failed to get server events channel")?;
        tokio::spawn(forward_events(events, sink));

        let setup = live_setup(&self.model, &setup);
        tracing::debug!("Live setup: {:?}", setup);
        client
            .send_setup(setup)
            .await
            .context("Failed to send session setup")?;

        Ok(Box::new(GeminiLiveSession { client }))
    }
}

struct GeminiLiveSession {
    client: Client,
}

#[async_trait]
impl RealtimeSession for GeminiLiveSession {
    async fn send_realtime_input(&mut self, input: RealtimeInput) -> Result<()> {
        self.client
            .send_realtime_input(input.data, &input.mime_type)
            .await
    }

    async fn close(&mut self) -> Result<()> {
        if let Ok(stats) = self.client.stats() {
            tracing::info!(
                "Live session closing after {} messages, {} tokens ({} prompt, {} response)",
                stats.messages_received(),
                stats.total_tokens(),
                stats.prompt_tokens(),
                stats.response_tokens()
            );
        }
        self.client.close().await
    }
}

fn live_setup(model: &str, setup: &SessionSetup) -> Setup {
    let mut configurator = Setup::new(model)
        .with_instructions(&setup.system_instruction)
        .with_voice(Voice::from(setup.voice.as_str()));
    configurator = match setup.response_modality {
        ResponseModality::Audio => configurator.with_modalities_enable_audio(),
        ResponseModality::Text => {
            configurator.with_modalities(vec![gemini_live::types::setup::Modality::Text])
        }
    };
    if setup.input_transcription {
        configurator = configurator.with_input_audio_transcription_enable();
    }
    if setup.output_transcription {
        configurator = configurator.with_output_audio_transcription_enable();
    }
    configurator.build()
}

// Relays server events into the session until the connection ends or the
// session stops listening.
async fn forward_events(mut events: ServerRx, sink: TransportSink) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let last = matches!(event, ServerEvent::Close { .. });
                if let Some(event) = translate(event) {
                    if !sink.emit(event) {
                        break;
                    }
                }
                if last {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                tracing::warn!("Live event stream lagged by {} messages.", n);
            }
            Err(RecvError::Closed) => {
                tracing::debug!("Live event channel closed.");
                break;
            }
        }
    }
}

fn translate(event: ServerEvent) -> Option<TransportEvent> {
    match event {
        ServerEvent::SetupComplete => Some(TransportEvent::Opened),
        ServerEvent::ServerContent(content) => inbound_message(content).map(TransportEvent::Message),
        ServerEvent::Usage(usage) => {
            tracing::debug!(
                "usage: {} tokens ({} prompt, {} response)",
                usage.total_token_count,
                usage.prompt_token_count,
                usage.response_token_count
            );
            None
        }
        ServerEvent::GoAway(go_away) => {
            tracing::warn!(
                "server will close the connection soon, time left: {}",
                go_away.time_left.as_deref().unwrap_or("unknown")
            );
            None
        }
        ServerEvent::Close {
            code,
            reason,
            clean,
        } => Some(TransportEvent::Closed {
            clean,
            reason: reason.or_else(|| code.map(|c| format!("connection closed with code {c}"))),
        }),
        ServerEvent::Error { message } => Some(TransportEvent::Error(message)),
    }
}

fn inbound_message(content: ServerContent) -> Option<InboundMessage> {
    let audio = content
        .model_turn
        .as_ref()
        .map(|turn| turn.audio_chunks().map(|blob| blob.data.clone()).collect())
        .unwrap_or_default();
    let message = InboundMessage {
        student_text: content.input_transcription.as_ref().map(|t| t.text.clone()),
        tutor_text: content.output_transcription.as_ref().map(|t| t.text.clone()),
        audio,
        turn_complete: content.is_turn_complete(),
        interrupted: content.is_interrupted(),
    };
    // e.g. a bare `generationComplete`
    (message != InboundMessage::default()).then_some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_live::types::events::server::ServerMessage;

    fn content(json: &str) -> ServerContent {
        let message: ServerMessage = serde_json::from_str(json).unwrap();
        message.server_content.unwrap()
    }

    #[test]
    fn server_content_becomes_one_message() {
        let content = content(
            r#"{"serverContent":{
                "modelTurn":{"parts":[
                    {"inlineData":{"mimeType":"audio/pcm;rate=24000","data":"AAEC"}},
                    {"text":"thinking"},
                    {"inlineData":{"mimeType":"audio/pcm;rate=24000","data":"AwQF"}}
                ]},
                "inputTranscription":{"text":"I have went"},
                "outputTranscription":{"text":"I have gone"},
                "turnComplete":true
            }}"#,
        );
        let message = inbound_message(content).unwrap();
        assert_eq!(message.audio, vec!["AAEC".to_string(), "AwQF".to_string()]);
        assert_eq!(message.student_text.as_deref(), Some("I have went"));
        assert_eq!(message.tutor_text.as_deref(), Some("I have gone"));
        assert!(message.turn_complete);
        assert!(!message.interrupted);
    }

    #[test]
    fn empty_content_is_dropped() {
        assert!(inbound_message(content(r#"{"serverContent":{"generationComplete":true}}"#)).is_none());
        let interrupted = inbound_message(content(r#"{"serverContent":{"interrupted":true}}"#));
        assert!(interrupted.unwrap().interrupted);
    }

    #[test]
    fn lifecycle_events_are_translated() {
        assert_eq!(translate(ServerEvent::SetupComplete), Some(TransportEvent::Opened));
        assert_eq!(
            translate(ServerEvent::Close {
                code: Some(1011),
                reason: None,
                clean: false
            }),
            Some(TransportEvent::Closed {
                clean: false,
                reason: Some("connection closed with code 1011".into())
            })
        );
        assert_eq!(
            translate(ServerEvent::Error {
                message: "reset".into()
            }),
            Some(TransportEvent::Error("reset".into()))
        );
        assert_eq!(translate(ServerEvent::GoAway(Default::default())), None);
    }

    #[test]
    fn setup_enables_audio_and_transcription() {
        let setup = live_setup(
            "models/live",
            &SessionSetup {
                system_instruction: "Be kind.".into(),
                voice: "Kore".into(),
                response_modality: ResponseModality::Audio,
                input_transcription: true,
                output_transcription: true,
            },
        );
        let json = serde_json::to_value(&setup).unwrap();
        assert_eq!(json["model"], "models/live");
        assert_eq!(json["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            json["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be kind.");
        assert!(setup.input_transcription_enabled());
        assert!(setup.output_transcription_enabled());
    }
}
