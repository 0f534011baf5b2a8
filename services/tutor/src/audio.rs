//! Microphone and speaker access through `cpal`.
//!
//! Device streams are not `Send`, so both types live on the task that drives the
//! session; the stream callbacks only talk to it through the event sinks.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfigRange};
use rubato::{FastFixedIn, Resampler};
use std::sync::{Arc, Mutex};
use tutor_core::audio_io::{AudioCapture, AudioPlayback};
use tutor_core::consts::{CAPTURE_FRAME_SIZE, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
use tutor_core::playback::SourceId;
use tutor_core::sink::{CaptureSink, PlaybackSink};
use tutor_native_utils::audio::{self, AudioBuffer};
use tutor_native_utils::device;

/// Input frames fed to the capture resampler per call.
const RESAMPLER_CHUNK: usize = 1024;

// Prefers an f32 config at exactly `rate`, so no resampling is needed.
fn preferred_config(
    ranges: impl Iterator<Item = SupportedStreamConfigRange>,
    rate: u32,
) -> Option<StreamConfig> {
    ranges
        .filter(|r| {
            r.sample_format() == SampleFormat::F32
                && r.min_sample_rate().0 <= rate
                && rate <= r.max_sample_rate().0
        })
        .min_by_key(|r| r.channels())
        .map(|r| r.with_sample_rate(SampleRate(rate)).config())
}

/// Turns device callbacks into fixed-size mono frames at the session input rate.
pub struct CaptureFramer {
    channels: usize,
    resampler: Option<FastFixedIn<f32>>,
    pending: Vec<f32>,
    frame: Vec<f32>,
}

impl CaptureFramer {
    pub fn new(device_rate: u32, channels: usize) -> Result<Self> {
        let resampler = if device_rate == INPUT_SAMPLE_RATE {
            None
        } else {
            Some(audio::create_resampler(
                device_rate as f64,
                INPUT_SAMPLE_RATE as f64,
                RESAMPLER_CHUNK,
            )?)
        };
        Ok(Self {
            channels,
            resampler,
            pending: Vec::new(),
            frame: Vec::with_capacity(CAPTURE_FRAME_SIZE * 2),
        })
    }

    /// Accepts interleaved device samples and returns every frame completed by them.
    pub fn push(&mut self, data: &[f32]) -> Vec<Vec<f32>> {
        let mono = audio::downmix(data, self.channels);
        match &mut self.resampler {
            None => self.frame.extend(mono),
            Some(resampler) => {
                self.pending.extend(mono);
                loop {
                    let needed = resampler.input_frames_next();
                    if self.pending.len() < needed {
                        break;
                    }
                    let chunk: Vec<f32> = self.pending.drain(..needed).collect();
                    match resampler.process(&[chunk.as_slice()], None) {
                        Ok(out) => {
                            if let Some(samples) = out.into_iter().next() {
                                self.frame.extend(samples);
                            }
                        }
                        Err(e) => tracing::warn!("Failed to resample input: {}", e),
                    }
                }
            }
        }

        let mut frames = Vec::new();
        while self.frame.len() >= CAPTURE_FRAME_SIZE {
            frames.push(self.frame.drain(..CAPTURE_FRAME_SIZE).collect());
        }
        frames
    }
}

pub struct CpalCapture {
    device_name: Option<String>,
    device: Option<(Device, StreamConfig)>,
    stream: Option<Stream>,
}

impl CpalCapture {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            device: None,
            stream: None,
        }
    }
}

impl AudioCapture for CpalCapture {
    fn open(&mut self) -> Result<()> {
        let input = device::get_or_default_input(self.device_name.as_deref())
            .context("Failed to get audio input device")?;
        let config = match preferred_config(input.supported_input_configs()?, INPUT_SAMPLE_RATE) {
            Some(config) => config,
            None => input
                .default_input_config()
                .context("Failed to get default input config")?
                .config(),
        };
        tracing::info!(
            "Using input device {:?}: {:?}",
            input.name().unwrap_or_default(),
            config
        );
        self.device = Some((input, config));
        Ok(())
    }

    fn start(&mut self, sink: CaptureSink) -> Result<()> {
        let (input, config) = self.device.as_ref().context("Capture device is not open")?;
        let mut framer = CaptureFramer::new(config.sample_rate.0, config.channels as usize)?;

        let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
            for frame in framer.push(data) {
                if !sink.emit_frame(frame) {
                    break;
                }
            }
        };
        let stream = input.build_input_stream(
            config,
            input_data_fn,
            move |err| tracing::error!("An error occurred on input stream: {}", err),
            None,
        )?;
        stream.play()?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        // Dropping the stream stops it.
        self.stream = None;
        self.device = None;
        Ok(())
    }
}

struct ScheduledVoice {
    id: SourceId,
    start_frame: u64,
    samples: Vec<f32>,
    sink: PlaybackSink,
}

impl ScheduledVoice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Sums every scheduled voice into the output and keeps the playback clock.
#[derive(Default)]
struct Mixer {
    frames_played: u64,
    voices: Vec<ScheduledVoice>,
}

impl Mixer {
    fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for (i, frame) in out.chunks_mut(channels).enumerate() {
            let t = self.frames_played + i as u64;
            let sample: f32 = self
                .voices
                .iter()
                .filter(|v| t >= v.start_frame)
                .filter_map(|v| v.samples.get((t - v.start_frame) as usize))
                .sum();
            frame.fill(sample.clamp(-1.0, 1.0));
        }
        self.frames_played += (out.len() / channels) as u64;

        let now = self.frames_played;
        self.voices.retain(|v| {
            let done = v.end_frame() <= now;
            if done {
                v.sink.finished(v.id);
            }
            !done
        });
    }
}

pub struct CpalPlayback {
    device_name: Option<String>,
    sample_rate: u32,
    mixer: Arc<Mutex<Mixer>>,
    stream: Option<Stream>,
}

impl CpalPlayback {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            sample_rate: 0,
            mixer: Arc::new(Mutex::new(Mixer::default())),
            stream: None,
        }
    }
}

fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let mut resampler = audio::create_resampler(from as f64, to as f64, samples.len())?;
    let out = resampler.process(&[samples], None)?;
    Ok(out.into_iter().next().unwrap_or_default())
}

impl AudioPlayback for CpalPlayback {
    fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let output = device::get_or_default_output(self.device_name.as_deref())
            .context("Failed to get audio output device")?;
        let config =
            match preferred_config(output.supported_output_configs()?, OUTPUT_SAMPLE_RATE) {
                Some(config) => config,
                None => output
                    .default_output_config()
                    .context("Failed to get default output config")?
                    .config(),
            };
        tracing::info!(
            "Using output device {:?}: {:?}",
            output.name().unwrap_or_default(),
            config
        );

        // A fresh clock for every stream.
        self.mixer = Arc::new(Mutex::new(Mixer::default()));
        let mixer = self.mixer.clone();
        let channels = config.channels as usize;
        let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            match mixer.lock() {
                Ok(mut mixer) => mixer.render(data, channels),
                Err(_) => data.fill(0.0),
            }
        };
        let stream = output.build_output_stream(
            &config,
            output_data_fn,
            move |err| tracing::error!("An error occurred on output stream: {}", err),
            None,
        )?;
        stream.play()?;
        self.sample_rate = config.sample_rate.0;
        self.stream = Some(stream);
        Ok(())
    }

    fn current_time(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        match self.mixer.lock() {
            Ok(mixer) => mixer.frames_played as f64 / self.sample_rate as f64,
            Err(_) => 0.0,
        }
    }

    fn start_source(
        &mut self,
        id: SourceId,
        buffer: AudioBuffer,
        start_at: f64,
        sink: PlaybackSink,
    ) -> Result<()> {
        anyhow::ensure!(self.stream.is_some(), "Playback is not open");
        let samples = buffer.channel_data(0).unwrap_or_default();
        let samples = resample(samples, buffer.sample_rate(), self.sample_rate)
            .context("Failed to resample tutor audio")?;
        let start_frame = (start_at * self.sample_rate as f64).round() as u64;

        let mut mixer = self
            .mixer
            .lock()
            .map_err(|_| anyhow::anyhow!("Playback mixer is poisoned"))?;
        mixer.voices.push(ScheduledVoice {
            id,
            start_frame,
            samples,
            sink,
        });
        Ok(())
    }

    fn stop_source(&mut self, id: SourceId) {
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.voices.retain(|v| v.id != id);
        }
    }

    fn close(&mut self) -> Result<()> {
        self.stream = None;
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.voices.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tutor_core::session_state::SessionEvent;

    #[test]
    fn native_rate_frames_are_exact() {
        let mut framer = CaptureFramer::new(INPUT_SAMPLE_RATE, 1).unwrap();
        assert!(framer.push(&[0.1; 4000]).is_empty());
        let frames = framer.push(&[0.1; 5000]);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.len() == CAPTURE_FRAME_SIZE));
    }

    #[test]
    fn stereo_input_is_downmixed() {
        let mut framer = CaptureFramer::new(INPUT_SAMPLE_RATE, 2).unwrap();
        let interleaved: Vec<f32> = [0.2, 0.4].repeat(CAPTURE_FRAME_SIZE);
        let frames = framer.push(&interleaved);
        assert_eq!(frames.len(), 1);
        assert!((frames[0][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn device_rate_is_converted() {
        let mut framer = CaptureFramer::new(48000, 1).unwrap();
        // one second at 48 kHz is a little under four frames at 16 kHz
        let frames = framer.push(&vec![0.0; 48000]);
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn mixer_plays_voices_at_their_start_and_reports_them_done() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut mixer = Mixer::default();
        mixer.voices.push(ScheduledVoice {
            id: 7,
            start_frame: 2,
            samples: vec![0.5, 0.5],
            sink: PlaybackSink::new(1, tx),
        });

        let mut out = vec![1.0; 6];
        // three stereo frames
        mixer.render(&mut out, 2);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.5]);
        assert!(rx.try_recv().is_err());

        let mut out = vec![0.0; 2];
        mixer.render(&mut out, 2);
        assert_eq!(out, vec![0.5, 0.5]);
        assert_eq!(mixer.frames_played, 4);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::PlaybackFinished {
                generation: 1,
                source: 7
            }
        );
        assert!(mixer.voices.is_empty());
    }

    #[test]
    fn overlapping_voices_are_clamped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut mixer = Mixer::default();
        for id in 0..2 {
            mixer.voices.push(ScheduledVoice {
                id,
                start_frame: 0,
                samples: vec![0.75],
                sink: PlaybackSink::new(1, tx.clone()),
            });
        }
        let mut out = vec![0.0; 1];
        mixer.render(&mut out, 1);
        assert_eq!(out, vec![1.0]);
    }
}
