//! System instruction assembly and end-of-lesson phrase detection.

use crate::lesson::{LessonBrief, TranscriptLog};

/// Default tutor persona. The lesson brief is appended below it.
pub const PERSONA_TEMPLATE: &str = r#"You are Emma, a warm and patient English tutor speaking with a student over a live voice call.
- Speak clearly and at a relaxed pace; keep each turn short so the student does most of the talking.
- Build the conversation around the lesson material described below.
- When the student makes a grammar, vocabulary or pronunciation mistake, gently repeat the sentence correctly and move on.
- Ask open questions that make the student use the target vocabulary.
- After roughly ten exchanges, or when the student asks to stop, wrap up with a short summary and say goodbye.

LESSON MATERIAL:"#;

/// Phrases that mark the tutor closing the lesson. Matched case-insensitively as substrings.
pub const END_PHRASES: &[&str] = &[
    "goodbye",
    "good bye",
    "see you next time",
    "that's all for today",
    "that is all for today",
    "end of our lesson",
    "our lesson is over",
];

/// Persona + briefing, plus a recap of the conversation when resuming after a dropped
/// connection so the tutor can pick up where it left off.
pub fn build_system_instruction(
    persona: &str,
    brief: &LessonBrief,
    log: &TranscriptLog,
    attempt: u32,
) -> String {
    let mut instruction = format!("{}\n\n{}", persona.trim_end(), brief.briefing_text());
    if let Some(url) = brief.source_url() {
        instruction.push_str(&format!("\n\n(Source: {url})"));
    }
    if attempt > 0 && !log.is_empty() {
        instruction.push_str(&recap_block(log));
    }
    instruction
}

fn recap_block(log: &TranscriptLog) -> String {
    format!(
        "\n\nIMPORTANT: The call was interrupted by a connection problem and has just been \
         restored. This is the conversation so far:\n{}\n\nContinue the lesson naturally from \
         this point. Do not greet the student again or restart the lesson.",
        log.render()
    )
}

/// True when the tutor's words contain any closing phrase.
pub fn contains_end_phrase(text: &str) -> bool {
    let lowered = text.to_lowercase();
    END_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::{MaterialKind, Speaker, TranscriptEntry};

    fn brief() -> LessonBrief {
        LessonBrief::new(MaterialKind::Text, "Practice ordering food in a restaurant.")
    }

    #[test]
    fn end_phrase_detection_is_case_insensitive_substring() {
        assert!(contains_end_phrase("Great job today, goodbye!"));
        assert!(contains_end_phrase("GOODBYE for now"));
        assert!(contains_end_phrase("Well, That's all for today."));
        assert!(!contains_end_phrase("Let's continue"));
        assert!(!contains_end_phrase(""));
    }

    #[test]
    fn first_connection_has_no_recap() {
        let mut log = TranscriptLog::new();
        log.push(TranscriptEntry::new(Speaker::Student, "Hello"));
        let instruction = build_system_instruction("PERSONA", &brief(), &log, 0);
        assert_eq!(instruction, "PERSONA\n\nPractice ordering food in a restaurant.");
    }

    #[test]
    fn reconnect_appends_ordered_recap() {
        let mut log = TranscriptLog::new();
        log.push(TranscriptEntry::new(Speaker::Tutor, "What would you like to eat?"));
        log.push(TranscriptEntry::new(Speaker::Student, "A pizza, please."));
        let instruction = build_system_instruction("PERSONA", &brief(), &log, 2);
        assert!(instruction.starts_with("PERSONA\n\nPractice ordering food"));
        let tutor = instruction.find("Tutor: What would you like to eat?").unwrap();
        let student = instruction.find("Student: A pizza, please.").unwrap();
        assert!(tutor < student);
        assert!(instruction.contains("Do not greet the student again"));
    }

    #[test]
    fn reconnect_with_empty_log_has_no_recap() {
        let instruction = build_system_instruction("PERSONA", &brief(), &TranscriptLog::new(), 1);
        assert!(!instruction.contains("interrupted"));
    }

    #[test]
    fn url_brief_mentions_source() {
        let brief = LessonBrief::from_url("https://news.example/story", "Discuss the story.");
        let instruction = build_system_instruction("P", &brief, &TranscriptLog::new(), 0);
        assert!(instruction.ends_with("(Source: https://news.example/story)"));
    }
}
