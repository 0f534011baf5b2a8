use crate::content::Content;
use crate::events::ServerEvent;

/// One frame received from the Live API. Any subset of the fields may be set.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_away: Option<GoAway>,
}

impl ServerMessage {
    pub fn into_events(self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        if self.setup_complete.is_some() {
            events.push(ServerEvent::SetupComplete);
        }
        if let Some(content) = self.server_content {
            events.push(ServerEvent::ServerContent(content));
        }
        if let Some(usage) = self.usage_metadata {
            events.push(ServerEvent::Usage(usage));
        }
        if let Some(go_away) = self.go_away {
            events.push(ServerEvent::GoAway(go_away));
        }
        events
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_turn: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_transcription: Option<Transcription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_transcription: Option<Transcription>,
}

impl ServerContent {
    pub fn is_turn_complete(&self) -> bool {
        self.turn_complete.unwrap_or(false)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: i64,
    #[serde(default)]
    pub response_token_count: i64,
    #[serde(default)]
    pub total_token_count: i64,
}

/// Sent shortly before the server drops the connection.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    /// Remaining time as a protobuf duration string, e.g. `"10s"`.
    #[serde(default)]
    pub time_left: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_content_splits_into_events() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": { "parts": [ { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAA=" } } ] },
                "outputTranscription": { "text": "Hello there" },
                "turnComplete": true
            },
            "usageMetadata": { "promptTokenCount": 3, "responseTokenCount": 4, "totalTokenCount": 7 }
        }"#;
        let message: ServerMessage = serde_json::from_str(raw).unwrap();
        let events = message.into_events();
        assert_eq!(events.len(), 2);

        let ServerEvent::ServerContent(content) = &events[0] else {
            panic!("expected server content, got {:?}", events[0]);
        };
        assert!(content.is_turn_complete());
        assert!(!content.is_interrupted());
        assert_eq!(content.output_transcription.as_ref().unwrap().text, "Hello there");
        let audio: Vec<_> = content.model_turn.as_ref().unwrap().audio_chunks().collect();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].data, "AAA=");

        assert!(matches!(&events[1], ServerEvent::Usage(u) if u.total_token_count == 7));
    }

    #[test]
    fn setup_complete_is_recognised() {
        let message: ServerMessage = serde_json::from_str(r#"{"setupComplete":{}}"#).unwrap();
        let events = message.into_events();
        assert!(matches!(events.as_slice(), [ServerEvent::SetupComplete]));
    }
}
