//! Event sinks handed to I/O collaborators. Each one is stamped with the
//! connection generation it belongs to, so the session can drop anything a
//! torn-down connection still delivers.

use crate::generic_types::TransportEvent;
use crate::playback::SourceId;
use crate::session_state::SessionEvent;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone)]
pub struct TransportSink {
    generation: u64,
    tx: UnboundedSender<SessionEvent>,
}

impl TransportSink {
    pub fn new(generation: u64, tx: UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    /// Returns false once the session is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(SessionEvent::Transport {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone)]
pub struct CaptureSink {
    generation: u64,
    tx: UnboundedSender<SessionEvent>,
}

impl CaptureSink {
    pub fn new(generation: u64, tx: UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn emit_frame(&self, samples: Vec<f32>) -> bool {
        self.tx
            .send(SessionEvent::CaptureFrame {
                generation: self.generation,
                samples,
            })
            .is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackSink {
    generation: u64,
    tx: UnboundedSender<SessionEvent>,
}

impl PlaybackSink {
    pub fn new(generation: u64, tx: UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn finished(&self, source: SourceId) -> bool {
        self.tx
            .send(SessionEvent::PlaybackFinished {
                generation: self.generation,
                source,
            })
            .is_ok()
    }
}
