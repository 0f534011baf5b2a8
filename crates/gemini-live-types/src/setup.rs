use crate::content::Content;
use crate::voice::Voice;

/// The first message of every Live session. Nothing else may be sent until the
/// server answers with `setupComplete`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Fully qualified model name, e.g. `models/gemini-2.5-flash-native-audio-preview-09-2025`.
    model: String,

    generation_config: GenerationConfig,

    /// Behavioural instructions for the whole session.
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,

    /// Present (even empty) to switch on transcription of the audio we send.
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_transcription: Option<AudioTranscriptionConfig>,

    /// Present (even empty) to switch on transcription of the model's audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    output_audio_transcription: Option<AudioTranscriptionConfig>,
}

impl Setup {
    pub fn new(model: &str) -> SetupConfigurator {
        SetupConfigurator::new(model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generation_config(&self) -> &GenerationConfig {
        &self.generation_config
    }

    pub fn system_instruction(&self) -> Option<&Content> {
        self.system_instruction.as_ref()
    }

    pub fn input_transcription_enabled(&self) -> bool {
        self.input_audio_transcription.is_some()
    }

    pub fn output_transcription_enabled(&self) -> bool {
        self.output_audio_transcription.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    Text,
    Audio,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default)]
    pub response_modalities: Vec<Modality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: Voice,
}

impl SpeechConfig {
    pub fn with_voice(voice: Voice) -> Self {
        Self {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: voice },
            },
        }
    }

    pub fn voice(&self) -> &Voice {
        &self.voice_config.prebuilt_voice_config.voice_name
    }
}

/// Empty marker object; the API takes no options yet.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AudioTranscriptionConfig {}

pub struct SetupConfigurator {
    setup: Setup,
}

impl SetupConfigurator {
    pub fn new(model: &str) -> Self {
        Self {
            setup: Setup {
                model: model.to_string(),
                generation_config: GenerationConfig {
                    response_modalities: vec![Modality::Text],
                    speech_config: None,
                    temperature: None,
                },
                system_instruction: None,
                input_audio_transcription: None,
                output_audio_transcription: None,
            },
        }
    }

    pub fn with_modalities_enable_audio(mut self) -> Self {
        self.setup.generation_config.response_modalities = vec![Modality::Audio];
        self
    }

    pub fn with_modalities(mut self, modalities: Vec<Modality>) -> Self {
        self.setup.generation_config.response_modalities = modalities;
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.setup.system_instruction = Some(Content::from_text(instructions));
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.setup.generation_config.speech_config = Some(SpeechConfig::with_voice(voice));
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.setup.generation_config.temperature = Some(temperature);
        self
    }

    pub fn with_input_audio_transcription_enable(mut self) -> Self {
        self.setup.input_audio_transcription = Some(AudioTranscriptionConfig::default());
        self
    }

    pub fn with_output_audio_transcription_enable(mut self) -> Self {
        self.setup.output_audio_transcription = Some(AudioTranscriptionConfig::default());
        self
    }

    pub fn build(self) -> Setup {
        self.setup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_setup_serializes_in_live_api_shape() {
        let setup = Setup::new("models/test-model")
            .with_modalities_enable_audio()
            .with_voice(Voice::Zephyr)
            .with_instructions("Be kind.")
            .with_input_audio_transcription_enable()
            .with_output_audio_transcription_enable()
            .build();

        let json = serde_json::to_value(&setup).unwrap();
        assert_eq!(json["model"], "models/test-model");
        assert_eq!(json["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            json["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Zephyr"
        );
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be kind.");
        assert_eq!(json["inputAudioTranscription"], serde_json::json!({}));
        assert_eq!(json["outputAudioTranscription"], serde_json::json!({}));
    }

    #[test]
    fn transcription_is_omitted_unless_enabled() {
        let setup = Setup::new("models/test-model").build();
        let json = serde_json::to_value(&setup).unwrap();
        assert!(json.get("inputAudioTranscription").is_none());
        assert!(json.get("systemInstruction").is_none());
        assert!(!setup.output_transcription_enabled());
    }
}
