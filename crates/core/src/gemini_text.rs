use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tutor_native_utils::audio;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
pub struct TextPart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, all parts joined.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Minimal client for the `generateContent` endpoint, shared by the brief and
/// feedback providers.
pub struct GeminiTextClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiTextClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one user turn made of `parts`, optionally with tools enabled, and
    /// returns the model's text.
    pub async fn generate(&self, parts: Vec<Value>, tools: Vec<Value>) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }]
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }

        let resp = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .context("generateContent request failed")?
            .error_for_status()?
            .json::<GenerateContentResponse>()
            .await
            .context("unexpected generateContent response")?;

        resp.text()
            .ok_or_else(|| anyhow::anyhow!("No response from model {}", self.model))
    }
}

pub fn text_part(text: &str) -> Value {
    json!({ "text": text })
}

pub fn inline_part(bytes: &[u8], mime_type: &str) -> Value {
    json!({ "inlineData": { "mimeType": mime_type, "data": audio::encode(bytes) } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        }))
    }

    #[tokio::test]
    async fn generate_posts_parts_and_reads_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }],
                "tools": [{ "urlContext": {} }]
            })))
            .respond_with(reply("  hi there "))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiTextClient::new("test-key".into(), "gemini-2.5-flash".into())
            .with_base_url(&server.uri());
        let text = client
            .generate(vec![text_part("hello")], vec![json!({ "urlContext": {} })])
            .await
            .unwrap();
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn http_errors_and_empty_candidates_fail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client =
            GeminiTextClient::new("k".into(), "m".into()).with_base_url(&server.uri());
        assert!(client.generate(vec![text_part("a")], vec![]).await.is_err());
        assert!(client.generate(vec![text_part("a")], vec![]).await.is_err());
    }

    #[test]
    fn inline_part_is_base64() {
        assert_eq!(
            inline_part(&[1, 2, 3], "image/png"),
            json!({ "inlineData": { "mimeType": "image/png", "data": "AQID" } })
        );
    }
}
