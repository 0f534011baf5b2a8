use crate::Command;
use crate::audio_io::{AudioCapture, AudioPlayback};
use crate::consts::OUTPUT_SAMPLE_RATE;
use crate::generic_types::SessionSetup;
use crate::lesson::{LessonBrief, TranscriptEntry};
use crate::playback::PlaybackScheduler;
use crate::realtime_api::{RealtimeSession, RealtimeTransport};
use crate::session_state::{
    SessionEvent, SessionMachine, SessionPhase, SessionSettings, SessionUpdate,
};
use crate::sink::{CaptureSink, PlaybackSink, TransportSink};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tutor_native_utils::audio;

/// How a session ended. Failures never escape as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The lesson ended, by the tutor or by the student.
    Completed(Vec<TranscriptEntry>),
    /// Every reconnect attempt failed.
    Failed {
        message: String,
        transcript: Vec<TranscriptEntry>,
    },
    /// Unmounted before the lesson ended.
    Cancelled(Vec<TranscriptEntry>),
}

/// Cloneable remote control for a running [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    /// Ends the lesson now, keeping whatever the student was still saying.
    pub fn end_lesson(&self) -> bool {
        self.tx.send(SessionEvent::EndRequested).is_ok()
    }

    /// Tears everything down without producing a transcript.
    pub fn unmount(&self) -> bool {
        self.tx.send(SessionEvent::Unmount).is_ok()
    }
}

/// Drives a [`SessionMachine`] against real (or fake) I/O.
///
/// Audio callbacks, the transport reader and timers only post events into one
/// queue; this loop is the only place that mutates session state. Commands are
/// executed in order and a `Connect` is awaited before the next event is taken,
/// so a session handle always exists by the time its `Opened` event arrives.
pub struct SessionManager<T, C, P> {
    machine: SessionMachine,
    transport: T,
    capture: C,
    playback: P,
    scheduler: PlaybackScheduler,
    session: Option<Box<dyn RealtimeSession>>,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    updates: Option<UnboundedSender<SessionUpdate>>,
    outcome: Option<SessionOutcome>,
}

impl<T, C, P> SessionManager<T, C, P>
where
    T: RealtimeTransport,
    C: AudioCapture,
    P: AudioPlayback,
{
    pub fn new(
        brief: LessonBrief,
        settings: SessionSettings,
        transport: T,
        capture: C,
        playback: P,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            machine: SessionMachine::new(brief, settings),
            transport,
            capture,
            playback,
            scheduler: PlaybackScheduler::new(),
            session: None,
            events_tx,
            events_rx,
            updates: None,
            outcome: None,
        }
    }

    /// Live phase and transcript updates. Only the latest subscriber receives them.
    pub fn subscribe(&mut self) -> UnboundedReceiver<SessionUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.updates = Some(tx);
        rx
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.events_tx.clone(),
        }
    }

    pub async fn run(mut self) -> SessionOutcome {
        self.dispatch(SessionEvent::Start).await;
        loop {
            if let Some(outcome) = self.outcome.take() {
                return outcome;
            }
            // We hold a sender ourselves, so the queue never runs dry.
            let Some(event) = self.events_rx.recv().await else {
                self.dispatch(SessionEvent::Unmount).await;
                continue;
            };
            self.dispatch(event).await;
        }
    }

    async fn dispatch(&mut self, event: SessionEvent) {
        if let SessionEvent::PlaybackFinished { source, .. } = event {
            if self.scheduler.finished(source) {
                tracing::trace!("playback source {source} finished");
            }
            return;
        }

        for command in self.machine.handle(event) {
            self.execute(command).await;
        }

        if self.outcome.is_some() {
            return;
        }
        if let SessionPhase::Error(message) = self.machine.phase() {
            self.outcome = Some(SessionOutcome::Failed {
                message: message.clone(),
                transcript: self.machine.log().entries().to_vec(),
            });
        } else if self.machine.is_finished() {
            self.outcome = Some(SessionOutcome::Cancelled(
                self.machine.log().entries().to_vec(),
            ));
        }
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::Teardown { final_cleanup } => {
                if final_cleanup {
                    tracing::info!("final teardown");
                }
                self.teardown().await;
            }
            Command::Connect { generation, setup } => self.connect(generation, setup).await,
            Command::StartCapture { generation } => {
                let sink = CaptureSink::new(generation, self.events_tx.clone());
                if let Err(e) = self.capture.start(sink) {
                    self.post(SessionEvent::ConnectFailed {
                        generation,
                        message: format!("microphone failed to start: {e:#}"),
                    });
                }
            }
            Command::SendAudio(input) => match self.session.as_mut() {
                Some(session) => {
                    if let Err(e) = session.send_realtime_input(input).await {
                        tracing::warn!("failed to send audio: {e:#}");
                    }
                }
                None => tracing::debug!("no open session, dropping audio frame"),
            },
            Command::PlayAudio { generation, pcm } => self.play(generation, &pcm),
            Command::FlushPlayback => self.flush_playback(),
            Command::ScheduleReconnect { generation, delay } => {
                self.schedule(delay, SessionEvent::BackoffElapsed { generation })
            }
            Command::ScheduleLessonEnd { delay } => {
                self.schedule(delay, SessionEvent::LessonEndDue)
            }
            Command::Publish(update) => {
                if let Some(tx) = &self.updates {
                    let _ = tx.send(update);
                }
            }
            Command::LessonEnded(transcript) => {
                tracing::info!("lesson ended with {} transcript entries", transcript.len());
                self.outcome = Some(SessionOutcome::Completed(transcript));
            }
        }
    }

    async fn connect(&mut self, generation: u64, setup: SessionSetup) {
        if let Err(e) = self.capture.open().and_then(|_| self.playback.open()) {
            self.post(SessionEvent::ConnectFailed {
                generation,
                message: format!("audio device unavailable: {e:#}"),
            });
            return;
        }

        let sink = TransportSink::new(generation, self.events_tx.clone());
        match self.transport.connect(setup, sink).await {
            Ok(session) => {
                tracing::info!("realtime session {generation} open");
                self.session = Some(session);
            }
            Err(e) => self.post(SessionEvent::ConnectFailed {
                generation,
                message: format!("{e:#}"),
            }),
        }
    }

    fn play(&mut self, generation: u64, pcm: &[u8]) {
        let buffer = audio::decode_audio_data(pcm, OUTPUT_SAMPLE_RATE, 1);
        if buffer.is_empty() {
            return;
        }
        let now = self.playback.current_time();
        let scheduled = self.scheduler.schedule(now, buffer.duration());
        let sink = PlaybackSink::new(generation, self.events_tx.clone());
        if let Err(e) = self
            .playback
            .start_source(scheduled.id, buffer, scheduled.start, sink)
        {
            self.scheduler.finished(scheduled.id);
            self.post(SessionEvent::PlaybackFailed {
                generation,
                message: format!("playback failed: {e:#}"),
            });
        }
    }

    fn flush_playback(&mut self) {
        let now = self.playback.current_time();
        for id in self.scheduler.interrupt(now) {
            self.playback.stop_source(id);
        }
    }

    fn stop_all_sources(&mut self) {
        for id in self.scheduler.drain() {
            self.playback.stop_source(id);
        }
        self.scheduler.reset();
    }

    /// Releases everything a connection holds. Safe to call any number of times;
    /// every step runs even when an earlier one fails.
    async fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::debug!("ignoring error while closing session: {e:#}");
            }
        }
        if let Err(e) = self.capture.stop() {
            tracing::warn!("failed to stop capture: {e:#}");
        }
        self.stop_all_sources();
        if let Err(e) = self.playback.close() {
            tracing::warn!("failed to close playback: {e:#}");
        }
    }

    fn schedule(&self, delay: Duration, event: SessionEvent) {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
    }

    fn post(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }
}
