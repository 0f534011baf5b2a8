use crate::consts::{
    DEFAULT_VOICE, INPUT_SAMPLE_RATE, LESSON_END_DELAY, MAX_RECONNECT_ATTEMPTS,
};
use crate::generic_types::{
    InboundMessage, RealtimeInput, ResponseModality, SessionSetup, TransportEvent,
};
use crate::lesson::{LessonBrief, Speaker, TranscriptEntry, TranscriptLog};
use crate::playback::SourceId;
use crate::prompt::{self, PERSONA_TEMPLATE};
use crate::Command;
use std::str::FromStr;
use std::time::Duration;
use tutor_native_utils::audio;

/// Connection phase as shown to the student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Terminal. Reached only once every reconnect attempt has failed.
    Error(String),
}

/// How transcription fragments relate to what came before them in the turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TranscriptMode {
    /// Each fragment is the full text so far and replaces the buffer.
    #[default]
    Cumulative,
    /// Each fragment is new text and is appended to the buffer.
    Delta,
}

impl FromStr for TranscriptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cumulative" => Ok(TranscriptMode::Cumulative),
            "delta" => Ok(TranscriptMode::Delta),
            other => Err(format!("unknown transcript mode {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub persona: String,
    pub voice: String,
    pub max_reconnect_attempts: u32,
    pub lesson_end_delay: Duration,
    pub transcript_mode: TranscriptMode,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            persona: PERSONA_TEMPLATE.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            lesson_end_delay: LESSON_END_DELAY,
            transcript_mode: TranscriptMode::default(),
        }
    }
}

/// Everything that can happen to a session. I/O and timer events carry the
/// generation of the connection that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Start,
    Transport { generation: u64, event: TransportEvent },
    ConnectFailed { generation: u64, message: String },
    PlaybackFailed { generation: u64, message: String },
    CaptureFrame { generation: u64, samples: Vec<f32> },
    PlaybackFinished { generation: u64, source: SourceId },
    BackoffElapsed { generation: u64 },
    LessonEndDue,
    EndRequested,
    Unmount,
}

/// Live progress published to whoever renders the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Phase { phase: SessionPhase, attempts: u32 },
    Partial { speaker: Speaker, text: String },
    Committed(TranscriptEntry),
    /// The server ended the call cleanly. The lesson stays open until the
    /// student ends it.
    ServerClosed,
}

/// The session's decision making, free of I/O. Every event is turned into the
/// commands the driver has to execute, in order.
pub struct SessionMachine {
    brief: LessonBrief,
    settings: SessionSettings,
    phase: SessionPhase,
    attempts: u32,
    generation: u64,
    student_partial: String,
    tutor_partial: String,
    log: TranscriptLog,
    lesson_end_scheduled: bool,
    // Set by lesson end and by unmount. Nothing happens afterwards.
    finished: bool,
}

impl SessionMachine {
    pub fn new(brief: LessonBrief, settings: SessionSettings) -> Self {
        Self {
            brief,
            settings,
            phase: SessionPhase::Idle,
            attempts: 0,
            generation: 0,
            student_partial: String::new(),
            tutor_partial: String::new(),
            log: TranscriptLog::new(),
            lesson_end_scheduled: false,
            finished: false,
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn log(&self) -> &TranscriptLog {
        &self.log
    }

    pub fn student_partial(&self) -> &str {
        &self.student_partial
    }

    pub fn tutor_partial(&self) -> &str {
        &self.tutor_partial
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        let mut commands = Vec::new();
        match event {
            SessionEvent::Start => {
                if self.finished || self.phase != SessionPhase::Idle {
                    tracing::debug!("ignoring start in phase {:?}", self.phase);
                } else {
                    self.begin_connect(&mut commands);
                }
            }
            SessionEvent::Transport { generation, event } => {
                if self.is_current(generation) {
                    self.on_transport(event, &mut commands);
                } else {
                    tracing::debug!("dropping transport event from generation {generation}");
                }
            }
            SessionEvent::ConnectFailed {
                generation,
                message,
            }
            | SessionEvent::PlaybackFailed {
                generation,
                message,
            } => {
                if self.is_current(generation) && self.is_live() {
                    self.fail(message, &mut commands);
                }
            }
            SessionEvent::CaptureFrame {
                generation,
                samples,
            } => {
                if self.is_current(generation) && self.phase == SessionPhase::Connected {
                    commands.push(Command::SendAudio(RealtimeInput {
                        data: audio::encode_f32(&samples),
                        mime_type: audio::pcm_mime_type(INPUT_SAMPLE_RATE),
                    }));
                }
            }
            // Source bookkeeping lives with the driver.
            SessionEvent::PlaybackFinished { .. } => {}
            SessionEvent::BackoffElapsed { generation } => {
                if self.is_current(generation)
                    && matches!(self.phase, SessionPhase::Reconnecting { .. })
                {
                    self.begin_connect(&mut commands);
                }
            }
            SessionEvent::LessonEndDue => {
                if self.lesson_end_scheduled && !self.finished {
                    self.end_lesson(&mut commands);
                }
            }
            SessionEvent::EndRequested => {
                if !self.finished {
                    self.end_lesson(&mut commands);
                }
            }
            SessionEvent::Unmount => {
                if !self.finished {
                    self.finished = true;
                    commands.push(Command::Teardown {
                        final_cleanup: true,
                    });
                    self.set_phase(SessionPhase::Idle, &mut commands);
                }
            }
        }
        commands
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.finished && generation == self.generation
    }

    fn is_live(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Connecting | SessionPhase::Connected
        )
    }

    fn begin_connect(&mut self, commands: &mut Vec<Command>) {
        commands.push(Command::Teardown {
            final_cleanup: false,
        });
        self.generation += 1;
        self.set_phase(SessionPhase::Connecting, commands);

        let system_instruction = prompt::build_system_instruction(
            &self.settings.persona,
            &self.brief,
            &self.log,
            self.attempts,
        );
        commands.push(Command::Connect {
            generation: self.generation,
            setup: SessionSetup {
                system_instruction,
                voice: self.settings.voice.clone(),
                response_modality: ResponseModality::Audio,
                input_transcription: true,
                output_transcription: true,
            },
        });
    }

    fn on_transport(&mut self, event: TransportEvent, commands: &mut Vec<Command>) {
        match event {
            TransportEvent::Opened => {
                if self.phase == SessionPhase::Connecting {
                    self.attempts = 0;
                    self.set_phase(SessionPhase::Connected, commands);
                    commands.push(Command::StartCapture {
                        generation: self.generation,
                    });
                }
            }
            TransportEvent::Message(message) => {
                if self.is_live() {
                    if let Err(reason) = self.apply_message(message, commands) {
                        self.fail(reason, commands);
                    }
                }
            }
            TransportEvent::Error(message) => {
                if self.is_live() {
                    self.fail(message, commands);
                }
            }
            TransportEvent::Closed { clean, reason } => {
                if !self.is_live() {
                    return;
                }
                if clean {
                    tracing::info!("session closed by the server");
                    commands.push(Command::Teardown {
                        final_cleanup: false,
                    });
                    self.set_phase(SessionPhase::Idle, commands);
                    commands.push(Command::Publish(SessionUpdate::ServerClosed));
                } else {
                    let reason =
                        reason.unwrap_or_else(|| "connection closed unexpectedly".to_string());
                    self.fail(reason, commands);
                }
            }
        }
    }

    fn apply_message(
        &mut self,
        message: InboundMessage,
        commands: &mut Vec<Command>,
    ) -> Result<(), String> {
        // Decode first so a corrupt payload leaves the turn untouched.
        let mut pcm_chunks = Vec::with_capacity(message.audio.len());
        for chunk in &message.audio {
            let pcm = audio::decode(chunk).map_err(|e| format!("bad audio payload: {e}"))?;
            pcm_chunks.push(pcm);
        }

        if let Some(text) = message.student_text {
            self.update_partial(Speaker::Student, &text, commands);
        }
        if let Some(text) = message.tutor_text {
            self.update_partial(Speaker::Tutor, &text, commands);
        }
        if message.interrupted {
            tracing::debug!("tutor interrupted, flushing playback");
            commands.push(Command::FlushPlayback);
        }
        for pcm in pcm_chunks {
            commands.push(Command::PlayAudio {
                generation: self.generation,
                pcm,
            });
        }
        if message.turn_complete {
            self.commit_turn(commands);
        }
        Ok(())
    }

    fn update_partial(&mut self, speaker: Speaker, text: &str, commands: &mut Vec<Command>) {
        let buffer = match speaker {
            Speaker::Student => &mut self.student_partial,
            Speaker::Tutor => &mut self.tutor_partial,
        };
        match self.settings.transcript_mode {
            TranscriptMode::Cumulative => {
                buffer.clear();
                buffer.push_str(text);
            }
            TranscriptMode::Delta => buffer.push_str(text),
        }
        commands.push(Command::Publish(SessionUpdate::Partial {
            speaker,
            text: buffer.clone(),
        }));
    }

    /// Student first, then tutor. Both buffers are cleared whatever they held.
    fn commit_turn(&mut self, commands: &mut Vec<Command>) {
        let student = std::mem::take(&mut self.student_partial);
        let tutor = std::mem::take(&mut self.tutor_partial);

        for (speaker, text) in [(Speaker::Student, student), (Speaker::Tutor, tutor)] {
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let entry = TranscriptEntry::new(speaker, text);
            self.log.push(entry.clone());
            commands.push(Command::Publish(SessionUpdate::Committed(entry)));

            if speaker == Speaker::Tutor
                && !self.lesson_end_scheduled
                && prompt::contains_end_phrase(text)
            {
                tracing::info!(
                    "tutor closed the lesson, ending in {:?}",
                    self.settings.lesson_end_delay
                );
                self.lesson_end_scheduled = true;
                commands.push(Command::ScheduleLessonEnd {
                    delay: self.settings.lesson_end_delay,
                });
            }
        }
    }

    fn fail(&mut self, reason: String, commands: &mut Vec<Command>) {
        tracing::error!("session failure: {reason}");
        commands.push(Command::Teardown {
            final_cleanup: false,
        });
        if self.attempts < self.settings.max_reconnect_attempts {
            self.attempts += 1;
            let delay = backoff_delay(self.attempts);
            tracing::info!("reconnect attempt {} in {:?}", self.attempts, delay);
            self.set_phase(
                SessionPhase::Reconnecting {
                    attempt: self.attempts,
                },
                commands,
            );
            commands.push(Command::ScheduleReconnect {
                generation: self.generation,
                delay,
            });
        } else {
            self.set_phase(SessionPhase::Error(reason), commands);
        }
    }

    fn end_lesson(&mut self, commands: &mut Vec<Command>) {
        self.finished = true;
        let mut transcript = self.log.entries().to_vec();
        let pending = std::mem::take(&mut self.student_partial);
        if !pending.trim().is_empty() {
            transcript.push(TranscriptEntry::new(Speaker::Student, pending.trim()));
        }
        self.tutor_partial.clear();

        commands.push(Command::Teardown {
            final_cleanup: true,
        });
        self.set_phase(SessionPhase::Idle, commands);
        commands.push(Command::LessonEnded(transcript));
    }

    fn set_phase(&mut self, phase: SessionPhase, commands: &mut Vec<Command>) {
        if self.phase == phase {
            return;
        }
        tracing::info!("session phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase.clone();
        commands.push(Command::Publish(SessionUpdate::Phase {
            phase,
            attempts: self.attempts,
        }));
    }
}

/// 1s, 2s, 4s, ... for attempts 1, 2, 3, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt.saturating_sub(1)))
}
