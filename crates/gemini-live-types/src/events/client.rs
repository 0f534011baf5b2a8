use crate::content::Blob;
use crate::Base64EncodedAudioBytes;

/// `realtimeInput` message carrying streamed media.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputEvent {
    media_chunks: Vec<Blob>,
}

impl RealtimeInputEvent {
    pub fn new(audio: Base64EncodedAudioBytes, mime_type: &str) -> Self {
        Self {
            media_chunks: vec![Blob::new(mime_type, audio)],
        }
    }

    pub fn media_chunks(&self) -> &[Blob] {
        &self.media_chunks
    }
}
