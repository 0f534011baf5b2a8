use crate::generic_types::{RealtimeInput, SessionSetup};
use crate::sink::TransportSink;
use anyhow::Result;
use async_trait::async_trait;

/// A realtime, bidirectional AI voice provider. Implementations push every
/// callback (open, message, error, close) into the given sink.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn connect(
        &self,
        setup: SessionSetup,
        sink: TransportSink,
    ) -> Result<Box<dyn RealtimeSession>>;
}

/// Handle to one open duplex session.
#[async_trait]
pub trait RealtimeSession: Send {
    async fn send_realtime_input(&mut self, input: RealtimeInput) -> Result<()>;

    /// Best effort; the caller ignores failures.
    async fn close(&mut self) -> Result<()>;
}
