//! Terminal presentation: collect material, run the session, show feedback.
//! Everything here only moves data between the user and the core.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedReceiver;
use tutor_core::brief::{BriefProvider, Material, build_brief};
use tutor_core::lesson::{LessonBrief, Speaker, TranscriptEntry};
use tutor_core::manager::SessionOutcome;
use tutor_core::session_state::{SessionPhase, SessionUpdate};

/// Which screen the user is on.
#[derive(Debug)]
pub enum View {
    CollectMaterial,
    Session(LessonBrief),
    Feedback(Vec<TranscriptEntry>),
}

/// Lesson material options. At most one may be given; without any, the material
/// is read from standard input.
#[derive(Debug, Default, Args)]
#[group(multiple = false)]
pub struct MaterialArgs {
    /// Picture to talk about
    #[arg(long)]
    pub image: Option<PathBuf>,
    /// Text to talk about
    #[arg(long)]
    pub text: Option<String>,
    /// File holding text to talk about
    #[arg(long)]
    pub text_file: Option<PathBuf>,
    /// Web page to talk about
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn read_material(args: &MaterialArgs) -> Result<Material> {
    if let Some(path) = &args.image {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        let mime_type = mime_guess::from_path(path)
            .first()
            .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
            .with_context(|| format!("{} does not look like an image", path.display()))?;
        return Ok(Material::Image {
            bytes,
            mime_type: mime_type.essence_str().to_string(),
        });
    }
    if let Some(text) = &args.text {
        return Ok(Material::Text(text.clone()));
    }
    if let Some(path) = &args.text_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(Material::Text(text));
    }
    if let Some(url) = &args.url {
        return Ok(Material::Url(url.clone()));
    }

    println!("Paste the lesson material, then press Ctrl-D:");
    let text = tokio::task::spawn_blocking(|| std::io::read_to_string(std::io::stdin()))
        .await?
        .context("Failed to read material from stdin")?;
    Ok(Material::Text(text))
}

pub async fn collect_brief(provider: &dyn BriefProvider, material: &Material) -> LessonBrief {
    println!("Preparing your lesson...");
    let brief = build_brief(provider, material).await;
    tracing::debug!("Lesson brief: {}", brief.briefing_text());
    brief
}

pub fn render_update(update: &SessionUpdate) -> Option<String> {
    match update {
        SessionUpdate::Phase { phase, attempts } => Some(match phase {
            SessionPhase::Idle => "[disconnected]".to_string(),
            SessionPhase::Connecting if *attempts > 0 => {
                format!("[reconnecting, attempt {attempts}...]")
            }
            SessionPhase::Connecting => "[connecting...]".to_string(),
            SessionPhase::Connected => {
                "[connected, start talking. Press Ctrl-C to end the lesson]".to_string()
            }
            SessionPhase::Reconnecting { attempt } => {
                format!("[connection lost, retrying (attempt {attempt})]")
            }
            SessionPhase::Error(message) => format!("[error] {message}"),
        }),
        SessionUpdate::Committed(entry) => Some(format!(
            "{}: {}",
            entry.speaker().label(),
            entry.text()
        )),
        SessionUpdate::ServerClosed => Some(
            "[the tutor hung up. Press Ctrl-C to finish and get your feedback]".to_string(),
        ),
        // Partial lines are too chatty for a plain terminal.
        SessionUpdate::Partial { .. } => None,
    }
}

/// Prints updates until the session drops its sender.
pub async fn print_updates(mut updates: UnboundedReceiver<SessionUpdate>) {
    while let Some(update) = updates.recv().await {
        if let SessionUpdate::Partial { speaker, text } = &update {
            tracing::trace!("{} (partial): {}", speaker.label(), text);
        }
        if let Some(line) = render_update(&update) {
            println!("{line}");
        }
    }
}

/// Where to go after a session. `None` ends the program.
pub fn next_view(outcome: SessionOutcome) -> Option<View> {
    match outcome {
        SessionOutcome::Completed(transcript) => Some(View::Feedback(transcript)),
        SessionOutcome::Failed { message, .. } => {
            eprintln!("The lesson could not continue: {message}");
            eprintln!("Please start a new lesson.");
            None
        }
        SessionOutcome::Cancelled(_) => None,
    }
}

pub fn show_feedback(transcript: &[TranscriptEntry], report: &str) {
    let student_turns = transcript
        .iter()
        .filter(|e| e.speaker() == Speaker::Student)
        .count();
    println!("\n=== Lesson feedback ({student_turns} of your turns reviewed) ===\n");
    println!("{report}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Write;
    use tutor_core::lesson::MaterialKind;

    struct EchoBrief;

    #[async_trait]
    impl BriefProvider for EchoBrief {
        async fn analyze_image(&self, bytes: &[u8], mime_type: &str) -> String {
            format!("{} bytes of {}", bytes.len(), mime_type)
        }

        async fn analyze_url(&self, url: &str) -> String {
            format!("page {url}")
        }

        async fn analyze_text(&self, text: &str) -> String {
            format!("text {text}")
        }
    }

    #[tokio::test]
    async fn image_material_gets_its_mime_type() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile()?;
        file.write_all(&[0x89, b'P', b'N', b'G'])?;
        let args = MaterialArgs {
            image: Some(file.path().to_path_buf()),
            ..Default::default()
        };

        let material = read_material(&args).await?;
        assert_eq!(
            material,
            Material::Image {
                bytes: vec![0x89, b'P', b'N', b'G'],
                mime_type: "image/png".into()
            }
        );

        let brief = collect_brief(&EchoBrief, &material).await;
        assert_eq!(brief.kind(), MaterialKind::Image);
        assert_eq!(brief.briefing_text(), "4 bytes of image/png");
        Ok(())
    }

    #[tokio::test]
    async fn non_image_files_are_rejected() -> Result<()> {
        let file = tempfile::Builder::new().suffix(".txt").tempfile()?;
        let args = MaterialArgs {
            image: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(read_material(&args).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn text_file_material_is_read() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, "Weekend plans")?;
        let args = MaterialArgs {
            text_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let brief = collect_brief(&EchoBrief, &read_material(&args).await?).await;
        assert_eq!(brief.briefing_text(), "text Weekend plans");
        Ok(())
    }

    #[test]
    fn updates_render_as_lines() {
        let committed = SessionUpdate::Committed(TranscriptEntry::new(Speaker::Tutor, "Hi!"));
        assert_eq!(render_update(&committed).as_deref(), Some("Tutor: Hi!"));

        let retry = SessionUpdate::Phase {
            phase: SessionPhase::Reconnecting { attempt: 2 },
            attempts: 2,
        };
        assert_eq!(
            render_update(&retry).as_deref(),
            Some("[connection lost, retrying (attempt 2)]")
        );

        let partial = SessionUpdate::Partial {
            speaker: Speaker::Student,
            text: "I wa".into(),
        };
        assert_eq!(render_update(&partial), None);

        let hint = render_update(&SessionUpdate::ServerClosed).unwrap();
        assert!(hint.contains("Ctrl-C"));
    }

    #[test]
    fn only_completed_lessons_get_feedback() {
        assert!(matches!(
            next_view(SessionOutcome::Completed(vec![])),
            Some(View::Feedback(_))
        ));
        assert!(
            next_view(SessionOutcome::Failed {
                message: "gone".into(),
                transcript: vec![]
            })
            .is_none()
        );
        assert!(next_view(SessionOutcome::Cancelled(vec![])).is_none());
    }
}
