mod audio;
mod config;
mod gemini_adapter;
mod prompt_loader;
mod shell;

use crate::audio::{CpalCapture, CpalPlayback};
use crate::config::Config;
use crate::gemini_adapter::GeminiLiveTransport;
use crate::shell::{MaterialArgs, View};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::fmt::time::ChronoLocal;
use tutor_core::brief::GeminiBriefProvider;
use tutor_core::consts::LESSON_END_DELAY;
use tutor_core::feedback::{FeedbackProvider, GeminiFeedbackProvider};
use tutor_core::gemini_text::GeminiTextClient;
use tutor_core::lesson::LessonBrief;
use tutor_core::manager::{SessionManager, SessionOutcome};
use tutor_core::prompt::PERSONA_TEMPLATE;
use tutor_core::session_state::SessionSettings;

#[derive(Parser)]
#[command(version, about = "Practice spoken English with a live AI tutor")]
struct Cli {
    #[command(flatten)]
    material: MaterialArgs,
    /// List audio devices and exit
    #[arg(long)]
    list_devices: bool,
    /// Microphone to use instead of the default one
    #[arg(long)]
    input_device: Option<String>,
    /// Speaker to use instead of the default one
    #[arg(long)]
    output_device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.list_devices {
        println!("Input devices:\n{}", tutor_native_utils::device::get_available_inputs()?);
        println!("Output devices:\n{}", tutor_native_utils::device::get_available_outputs()?);
        return Ok(());
    }

    // --- Configuration and logging ---
    let config = Config::from_env().context("Failed to load application configuration")?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("Configuration loaded successfully. Starting tutor...");

    let persona = prompt_loader::load_persona(&config.prompts_dir)
        .context("Failed to load prompts")?
        .unwrap_or_else(|| PERSONA_TEMPLATE.to_string());

    let text_client =
        || GeminiTextClient::new(config.gemini_api_key.clone(), config.text_model.clone());
    let briefs = GeminiBriefProvider::new(text_client());
    let feedback = GeminiFeedbackProvider::new(text_client());

    let mut view = View::CollectMaterial;
    loop {
        view = match view {
            View::CollectMaterial => {
                let material = shell::read_material(&cli.material).await?;
                View::Session(shell::collect_brief(&briefs, &material).await)
            }
            View::Session(brief) => {
                let outcome = run_session(&config, &cli, brief, &persona).await;
                match shell::next_view(outcome) {
                    Some(next) => next,
                    None => return Ok(()),
                }
            }
            View::Feedback(transcript) => {
                println!("Writing your feedback...");
                let report = feedback.summarize(&transcript).await;
                shell::show_feedback(&transcript, &report);
                return Ok(());
            }
        };
    }
}

async fn run_session(
    config: &Config,
    cli: &Cli,
    brief: LessonBrief,
    persona: &str,
) -> SessionOutcome {
    let settings = SessionSettings {
        persona: persona.to_string(),
        voice: config.voice.clone(),
        max_reconnect_attempts: config.max_reconnect_attempts,
        lesson_end_delay: LESSON_END_DELAY,
        transcript_mode: config.transcript_mode,
    };
    let mut manager = SessionManager::new(
        brief,
        settings,
        GeminiLiveTransport::new(&config.gemini_api_key, &config.live_model),
        CpalCapture::new(cli.input_device.clone()),
        CpalPlayback::new(cli.output_device.clone()),
    );
    let updates = manager.subscribe();

    let handle = manager.handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, ending the lesson");
            handle.end_lesson();
        }
    });

    // The manager owns the audio streams, which must stay on this task.
    let (outcome, ()) = tokio::join!(manager.run(), shell::print_updates(updates));
    ctrl_c.abort();
    outcome
}
