use serde::{Deserialize, Serialize};

/// What the student handed in as lesson material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    Text,
    Image,
    Url,
}

/// The distilled instruction derived from the uploaded material. Built once by a
/// brief provider and read once, when the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonBrief {
    kind: MaterialKind,
    briefing_text: String,
    source_url: Option<String>,
}

impl LessonBrief {
    pub fn new(kind: MaterialKind, briefing_text: impl Into<String>) -> Self {
        Self {
            kind,
            briefing_text: briefing_text.into(),
            source_url: None,
        }
    }

    pub fn from_url(url: &str, briefing_text: impl Into<String>) -> Self {
        Self {
            kind: MaterialKind::Url,
            briefing_text: briefing_text.into(),
            source_url: Some(url.to_string()),
        }
    }

    pub fn kind(&self) -> MaterialKind {
        self.kind
    }

    pub fn briefing_text(&self) -> &str {
        &self.briefing_text
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Student,
    Tutor,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Speaker::Student => "Student",
            Speaker::Tutor => "Tutor",
        }
    }
}

/// One completed utterance. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    id: String,
    speaker: Speaker,
    text: String,
}

impl TranscriptEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            speaker,
            text: text.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Append-only record of the conversation, in commit order.
#[derive(Debug, Clone, Default)]
pub struct TranscriptLog {
    entries: Vec<TranscriptEntry>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the log as `Speaker: text` lines.
    pub fn render(&self) -> String {
        render_transcript(&self.entries)
    }
}

pub fn render_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", e.speaker().label(), e.text()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_get_unique_ids() {
        let a = TranscriptEntry::new(Speaker::Student, "hi");
        let b = TranscriptEntry::new(Speaker::Student, "hi");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn log_renders_in_commit_order() {
        let mut log = TranscriptLog::new();
        log.push(TranscriptEntry::new(Speaker::Student, "I goed to school."));
        log.push(TranscriptEntry::new(Speaker::Tutor, "You went to school!"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.render(), "Student: I goed to school.\nTutor: You went to school!");
    }

    #[test]
    fn url_brief_keeps_its_source() {
        let brief = LessonBrief::from_url("https://example.com/a", "Talk about the article.");
        assert_eq!(brief.kind(), MaterialKind::Url);
        assert_eq!(brief.source_url(), Some("https://example.com/a"));
        assert_eq!(LessonBrief::new(MaterialKind::Text, "x").source_url(), None);
    }
}
