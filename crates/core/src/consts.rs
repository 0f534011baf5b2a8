use std::time::Duration;

/// Rate of the PCM16 audio we stream to the tutor.
pub const INPUT_SAMPLE_RATE: u32 = 16000;
/// Rate of the PCM16 audio the tutor streams back.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;
/// Samples per capture frame handed to the session.
pub const CAPTURE_FRAME_SIZE: usize = 4096;

pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;
/// Time left for trailing tutor audio after a closing phrase.
pub const LESSON_END_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_VOICE: &str = "Zephyr";
