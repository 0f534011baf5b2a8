use crate::gemini_text::{GeminiTextClient, text_part};
use crate::lesson::{TranscriptEntry, render_transcript};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Returned for a lesson in which nothing was said.
pub const EMPTY_TRANSCRIPT_FEEDBACK: &str =
    "No conversation was recorded in this lesson, so there is no feedback yet.";

pub const FALLBACK_FEEDBACK: &str = "Feedback could not be generated this time. Thank you \
for practicing today, and keep speaking English every day!";

const FEEDBACK_PROMPT: &str = "You are an experienced English teacher. Below is the \
transcript of a spoken lesson between a tutor and a student. Write a short feedback report \
for the student with these sections: Strengths, Grammar corrections (quote the student's \
sentence and give the corrected version), Vocabulary to review, and Next steps. Only judge \
the student's lines.";

/// Turns a finished lesson into a written report. Implementations never fail.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait FeedbackProvider: Send + Sync {
    async fn summarize(&self, transcript: &[TranscriptEntry]) -> String;
}

pub struct GeminiFeedbackProvider {
    client: GeminiTextClient,
}

impl GeminiFeedbackProvider {
    pub fn new(client: GeminiTextClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedbackProvider for GeminiFeedbackProvider {
    async fn summarize(&self, transcript: &[TranscriptEntry]) -> String {
        if transcript.is_empty() {
            return EMPTY_TRANSCRIPT_FEEDBACK.to_string();
        }
        let prompt = format!(
            "{FEEDBACK_PROMPT}\n\nTRANSCRIPT:\n{}",
            render_transcript(transcript)
        );
        match self.client.generate(vec![text_part(&prompt)], vec![]).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("feedback generation failed: {e:#}");
                FALLBACK_FEEDBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::Speaker;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GeminiFeedbackProvider {
        GeminiFeedbackProvider::new(
            GeminiTextClient::new("k".into(), "gemini-2.5-flash".into())
                .with_base_url(&server.uri()),
        )
    }

    #[tokio::test]
    async fn empty_transcript_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let report = provider(&server).summarize(&[]).await;
        assert_eq!(report, EMPTY_TRANSCRIPT_FEEDBACK);
    }

    #[tokio::test]
    async fn transcript_is_sent_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains(
                "Tutor: What did you do?\\nStudent: I goed home.",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [
                    { "text": "Strengths: " }, { "text": "good effort." }
                ] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transcript = vec![
            TranscriptEntry::new(Speaker::Tutor, "What did you do?"),
            TranscriptEntry::new(Speaker::Student, "I goed home."),
        ];
        let report = provider(&server).summarize(&transcript).await;
        assert_eq!(report, "Strengths: good effort.");
    }

    #[tokio::test]
    async fn failure_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let transcript = vec![TranscriptEntry::new(Speaker::Student, "Hello")];
        assert_eq!(provider(&server).summarize(&transcript).await, FALLBACK_FEEDBACK);
    }
}
