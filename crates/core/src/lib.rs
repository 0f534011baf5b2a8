pub mod audio_io;
pub mod brief;
pub mod consts;
pub mod feedback;
pub mod gemini_text;
pub mod generic_types;
pub mod lesson;
pub mod manager;
pub mod playback;
pub mod prompt;
pub mod realtime_api;
pub mod session_state;
pub mod sink;

use std::time::Duration;

/// Side effects the session logic (`SessionMachine`) asks the runtime
/// (`SessionManager`) to carry out.
///
/// Keeping decisions and execution apart lets the whole state machine be tested
/// without sockets, sound cards or timers.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Close the session, release the microphone, stop and forget every playback
    /// source and rewind the playback cursor. `final_cleanup` marks the last one.
    Teardown { final_cleanup: bool },
    /// Open a new duplex session for this generation.
    Connect {
        generation: u64,
        setup: generic_types::SessionSetup,
    },
    StartCapture { generation: u64 },
    SendAudio(generic_types::RealtimeInput),
    /// Schedule decoded PCM16 speech right after whatever is already queued.
    PlayAudio { generation: u64, pcm: Vec<u8> },
    /// Drop all queued speech, e.g. when the student talks over the tutor.
    FlushPlayback,
    ScheduleReconnect { generation: u64, delay: Duration },
    ScheduleLessonEnd { delay: Duration },
    Publish(session_state::SessionUpdate),
    /// Fired once, with the final transcript.
    LessonEnded(Vec<lesson::TranscriptEntry>),
}
