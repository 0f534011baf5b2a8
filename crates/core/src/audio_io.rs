use crate::playback::SourceId;
use crate::sink::{CaptureSink, PlaybackSink};
use anyhow::Result;
use tutor_native_utils::audio::AudioBuffer;

/// Microphone side of the session.
pub trait AudioCapture {
    /// Acquires the device at [`crate::consts::INPUT_SAMPLE_RATE`]. Called on every connect.
    fn open(&mut self) -> Result<()>;

    /// Starts delivering fixed-size mono frames until [`AudioCapture::stop`].
    fn start(&mut self, sink: CaptureSink) -> Result<()>;

    /// Stops streaming and releases the device. Must be safe to call at any time.
    fn stop(&mut self) -> Result<()>;
}

/// Speaker side of the session: a clock plus sources scheduled against it.
pub trait AudioPlayback {
    fn open(&mut self) -> Result<()>;

    /// Seconds elapsed on the playback clock.
    fn current_time(&self) -> f64;

    /// Plays `buffer` starting at `start_at` on the playback clock and reports
    /// through `sink` once it has finished on its own.
    fn start_source(
        &mut self,
        id: SourceId,
        buffer: AudioBuffer,
        start_at: f64,
        sink: PlaybackSink,
    ) -> Result<()>;

    /// Silences a source immediately. Unknown ids are ignored.
    fn stop_source(&mut self, id: SourceId);

    /// Must be safe to call at any time.
    fn close(&mut self) -> Result<()>;
}
