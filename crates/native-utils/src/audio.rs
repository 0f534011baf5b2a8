use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree};

/// Width in bytes of one PCM16 sample.
const SAMPLE_WIDTH: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Encodes raw bytes for transport inside JSON.
pub fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Exact inverse of [`encode`].
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(text)?)
}

/// MIME type announcing raw PCM16 at the given rate, e.g. `audio/pcm;rate=16000`.
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

/// A block of decoded, normalized samples ready to be scheduled for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_data(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    /// Number of frames (samples per channel).
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }
}

/// Interprets `bytes` as little-endian PCM16, channel-interleaved, and normalizes
/// every sample into [-1, 1). A trailing partial sample or partial frame is dropped.
pub fn decode_audio_data(bytes: &[u8], sample_rate: u32, channel_count: usize) -> AudioBuffer {
    let channel_count = channel_count.max(1);
    let samples: Vec<f32> = bytes
        .chunks_exact(SAMPLE_WIDTH)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect();
    let frame_count = samples.len() / channel_count;

    let mut channels = vec![Vec::with_capacity(frame_count); channel_count];
    for frame in samples.chunks_exact(channel_count) {
        for (channel, sample) in channels.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }
    AudioBuffer::new(sample_rate, channels)
}

/// Packs capture samples into PCM16 bytes and encodes them for transport.
pub fn encode_f32(pcm32: &[f32]) -> String {
    encode(&pcm32.to_binary())
}

/// Averages interleaved frames down to a single channel.
pub fn downmix(data: &[f32], channel_count: usize) -> Vec<f32> {
    if channel_count <= 1 {
        return data.to_vec();
    }
    data.chunks(channel_count)
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Converts audio samples to little-endian PCM16 bytes.
pub trait ToBinary {
    fn to_binary(&self) -> Vec<u8>;
}

impl ToBinary for [i16] {
    fn to_binary(&self) -> Vec<u8> {
        self.iter().flat_map(|&sample| sample.to_le_bytes()).collect()
    }
}

impl ToBinary for [f32] {
    fn to_binary(&self) -> Vec<u8> {
        // `as` truncates toward zero and saturates at the i16 bounds.
        self.iter()
            .flat_map(|&sample| ((sample * 32768.0) as i16).to_le_bytes())
            .collect()
    }
}
