/// Response modality requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseModality {
    Audio,
    Text,
}

/// Provider-neutral configuration for opening a duplex session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetup {
    pub system_instruction: String,
    pub voice: String,
    pub response_modality: ResponseModality,
    pub input_transcription: bool,
    pub output_transcription: bool,
}

/// One chunk of streamed media, already encoded for transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeInput {
    pub data: String,
    pub mime_type: String,
}

/// An inbound message split into the signals the session cares about.
/// Any subset may be present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundMessage {
    /// Latest transcription of the student's speech.
    pub student_text: Option<String>,
    /// Latest transcription of the tutor's speech.
    pub tutor_text: Option<String>,
    /// Base64 PCM16 chunks of tutor speech, in order.
    pub audio: Vec<String>,
    pub turn_complete: bool,
    /// The student talked over the tutor; queued speech should be dropped.
    pub interrupted: bool,
}

/// The callbacks of a duplex session, as data.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Message(InboundMessage),
    Error(String),
    Closed { clean: bool, reason: Option<String> },
}
