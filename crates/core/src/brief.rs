use crate::gemini_text::{GeminiTextClient, inline_part, text_part};
use crate::lesson::{LessonBrief, MaterialKind};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::json;

/// Used whenever the material could not be analyzed.
pub const FALLBACK_BRIEFING: &str = "The lesson material could not be analyzed. Have a \
friendly general conversation with the student about their day, hobbies and plans, and help \
them practice everyday English.";

const IMAGE_PROMPT: &str = "You are preparing an English lesson. Describe this image for a \
tutor who cannot see it: the scene, the people and objects, and any text in it. Then list \
ten useful vocabulary words and three conversation questions about it.";

const URL_PROMPT: &str = "You are preparing an English lesson. Read the page at the URL \
below and summarize its main points in plain English for a tutor. Then list ten useful \
vocabulary words and three conversation questions about it.";

const TEXT_PROMPT: &str = "You are preparing an English lesson. Summarize the following \
material for a tutor in plain English. Then list ten useful vocabulary words and three \
conversation questions about it.";

/// Turns raw material into a briefing for the tutor. Implementations never
/// fail: errors degrade to a fallback briefing.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait BriefProvider: Send + Sync {
    async fn analyze_image(&self, bytes: &[u8], mime_type: &str) -> String;

    async fn analyze_url(&self, url: &str) -> String;

    async fn analyze_text(&self, text: &str) -> String;
}

/// Lesson material as handed in by the student.
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Image { bytes: Vec<u8>, mime_type: String },
    Text(String),
    Url(String),
}

pub async fn build_brief(provider: &dyn BriefProvider, material: &Material) -> LessonBrief {
    match material {
        Material::Image { bytes, mime_type } => LessonBrief::new(
            MaterialKind::Image,
            provider.analyze_image(bytes, mime_type).await,
        ),
        Material::Text(text) => {
            LessonBrief::new(MaterialKind::Text, provider.analyze_text(text).await)
        }
        Material::Url(url) => LessonBrief::from_url(url, provider.analyze_url(url).await),
    }
}

pub struct GeminiBriefProvider {
    client: GeminiTextClient,
}

impl GeminiBriefProvider {
    pub fn new(client: GeminiTextClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BriefProvider for GeminiBriefProvider {
    async fn analyze_image(&self, bytes: &[u8], mime_type: &str) -> String {
        let parts = vec![inline_part(bytes, mime_type), text_part(IMAGE_PROMPT)];
        match self.client.generate(parts, vec![]).await {
            Ok(briefing) => briefing,
            Err(e) => {
                tracing::warn!("image analysis failed, using fallback briefing: {e:#}");
                FALLBACK_BRIEFING.to_string()
            }
        }
    }

    async fn analyze_url(&self, url: &str) -> String {
        let prompt = format!("{URL_PROMPT}\n\nURL: {url}");
        let tools = vec![json!({ "urlContext": {} })];
        match self.client.generate(vec![text_part(&prompt)], tools).await {
            Ok(briefing) => briefing,
            Err(e) => {
                tracing::warn!("url analysis failed, using fallback briefing: {e:#}");
                FALLBACK_BRIEFING.to_string()
            }
        }
    }

    // The student's own words are a better fallback than the generic one.
    async fn analyze_text(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return FALLBACK_BRIEFING.to_string();
        }
        let prompt = format!("{TEXT_PROMPT}\n\n---\n{text}\n---");
        match self.client.generate(vec![text_part(&prompt)], vec![]).await {
            Ok(briefing) => briefing,
            Err(e) => {
                tracing::warn!("text analysis failed, using the material as is: {e:#}");
                text.to_string()
            }
        }
    }
}
