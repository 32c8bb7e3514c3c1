mod analysis;
mod api;
mod chat;
mod config;
mod console;
mod credentials;
mod error;
mod image;
mod scene;
mod storyboard;

use analysis::ScriptAnalysisClient;
use anyhow::Context;
use api::{GeminiClient, GenerativeModel};
use chat::{ChatClient, ChatRole, ChatTranscript};
use clap::{Args, Parser, Subcommand};
use config::Config;
use credentials::{ensure_credential, ApiKeyStore, CredentialStatus, InteractiveCredentials};
use image::{decode_data_url, ImageSize, SceneImageClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use scene::ScriptAnalysisResult;
use storyboard::{GenerationOutcome, StoryboardState};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "storyboard")]
#[command(about = "Turn a script into a cinematic storyboard using hosted AI models", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Never prompt for an API key on stdin
    #[arg(long, global = true)]
    no_prompt: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a script and print title, genre, pacing and shot list
    Analyze {
        #[command(flatten)]
        input: ScriptInput,

        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Analyze a script and render a frame for every scene
    Generate {
        #[command(flatten)]
        input: ScriptInput,

        /// Frame resolution
        #[arg(short, long, value_enum, default_value_t = ImageSize::OneK)]
        size: ImageSize,

        /// Directory the frames are written to
        #[arg(short, long, default_value = "./storyboard")]
        output: PathBuf,

        /// Only render these scene numbers (repeatable)
        #[arg(long = "scene")]
        scenes: Vec<u32>,
    },
    /// Talk to the AI director
    Chat,
}

#[derive(Args, Debug)]
struct ScriptInput {
    /// Script text
    #[arg(short, long, conflicts_with = "file")]
    text: Option<String>,

    /// Plain-text script file
    #[arg(short, long)]
    file: Option<PathBuf>,
}

impl ScriptInput {
    async fn read(self) -> anyhow::Result<String> {
        if let Some(text) = self.text {
            return Ok(text);
        }
        let path = self
            .file
            .context("Either --text or --file must be provided")?;
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read script file: {}", path.display()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    cli.config.validate()?;

    let keys = ApiKeyStore::new(cli.config.resolved_api_key());
    let credentials = InteractiveCredentials::new(keys.clone(), !cli.no_prompt);

    if ensure_credential(&credentials).await == CredentialStatus::NotSelected {
        anyhow::bail!("No API key selected. Set GEMINI_API_KEY or pass --api-key");
    }

    let model: Arc<dyn GenerativeModel> = Arc::new(GeminiClient::new(&cli.config, keys)?);

    match cli.command {
        Command::Analyze { input, json } => {
            let script = input.read().await?;
            let analyzer = ScriptAnalysisClient::new(model, &cli.config.text_model);
            let analysis = analyzer.analyze(&script).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print!("{}", console::render_analysis(&analysis));
            }
        }
        Command::Generate {
            input,
            size,
            output,
            scenes,
        } => {
            let script = input.read().await?;
            tokio::fs::create_dir_all(&output)
                .await
                .context("Failed to create output directory")?;

            let analyzer = ScriptAnalysisClient::new(model.clone(), &cli.config.text_model);
            let images = SceneImageClient::new(model, &cli.config.image_model);

            if let Err(e) =
                run_storyboard(&analyzer, &images, &credentials, &script, size, &output, &scenes)
                    .await
            {
                error!("Storyboard generation failed: {}", e);
                std::process::exit(1);
            }
        }
        Command::Chat => run_chat(ChatClient::new(model, &cli.config.text_model)).await?,
    }

    Ok(())
}

async fn run_storyboard(
    analyzer: &ScriptAnalysisClient,
    images: &SceneImageClient,
    credentials: &InteractiveCredentials,
    script: &str,
    size: ImageSize,
    output: &Path,
    only: &[u32],
) -> anyhow::Result<()> {
    info!("Step 1/3: Analyzing script...");
    let mut state = StoryboardState::default();
    state.set_image_size(size);
    state.load_analysis(analyzer.analyze(script).await?);

    let Some(analysis) = state.analysis() else {
        anyhow::bail!("analysis was not loaded");
    };
    print!("{}", console::render_analysis(analysis));

    info!("Step 2/3: Rendering {} frames...", state.image_size());
    if only.is_empty() {
        let summary = state.request_generate_all(images, credentials).await;
        info!(
            "Frames: {} rendered, {} failed, {} already present",
            summary.succeeded, summary.failed, summary.skipped
        );
        if summary.aborted {
            warn!("Rendering stopped early: no API key selected");
        }
    } else {
        let ids: Vec<_> = state
            .analysis()
            .map(|a| {
                a.scenes
                    .iter()
                    .filter(|s| only.contains(&s.scene_number))
                    .map(|s| s.id)
                    .collect()
            })
            .unwrap_or_default();
        for id in ids {
            match state.request_single_generation(id, images, credentials).await {
                GenerationOutcome::Failed(message) => warn!("{}", message),
                GenerationOutcome::CredentialNotSelected
                | GenerationOutcome::ReauthorizationDeclined => {
                    warn!("Rendering stopped early: no API key selected");
                    break;
                }
                _ => {}
            }
        }
    }

    info!("Step 3/3: Exporting frames...");
    let Some(analysis) = state.analysis() else {
        anyhow::bail!("project was abandoned before export");
    };
    println!();
    let written = export_frames(analysis, output).await?;
    info!("Exported {} frames to {}", written, output.display());

    state.abandon_project();
    Ok(())
}

/// Write every generated frame under `output`. Frames that cannot be decoded are
/// logged and skipped. Returns how many files were written.
async fn export_frames(analysis: &ScriptAnalysisResult, output: &Path) -> anyhow::Result<usize> {
    let mut written = 0;
    for (idx, scene) in analysis.scenes.iter().enumerate() {
        println!("{}", console::scene_line(scene));
        let Some(url) = &scene.image_url else {
            continue;
        };
        let image = match decode_data_url(url) {
            Ok(image) => image,
            Err(e) => {
                warn!("Skipping frame for scene {}: {}", scene.scene_number, e);
                continue;
            }
        };
        let path = output.join(format!(
            "shot_{:02}_{}.{}",
            idx + 1,
            scene.scene_number,
            image.extension()
        ));
        tokio::fs::write(&path, &image.bytes)
            .await
            .with_context(|| format!("Failed to write frame: {}", path.display()))?;
        info!("Frame saved to: {}", path.display());
        written += 1;
    }
    Ok(written)
}

async fn run_chat(client: ChatClient) -> anyhow::Result<()> {
    let mut transcript = ChatTranscript::new(client);
    for message in transcript.messages() {
        println!("{}> {}", speaker(message.role), message.text);
    }

    while let Some(line) = console::prompt_line("you> ").await? {
        if matches!(line.trim(), "/quit" | "/exit") {
            break;
        }
        if let Some(reply) = transcript.send(&line).await {
            println!("{}> {}", speaker(reply.role), reply.text);
        }
    }

    Ok(())
}

fn speaker(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "you",
        ChatRole::Model => "director",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    fn framed(number: u32, url: &str) -> Scene {
        Scene::new(number, format!("Scene {number}"), "wide".into(), None).into_succeeded(url.into())
    }

    #[tokio::test]
    async fn export_skips_undecodable_frames() {
        let dir = tempfile::tempdir().unwrap();
        let analysis = ScriptAnalysisResult {
            title: "The Office".into(),
            genre: "Drama".into(),
            pacing: Vec::new(),
            scenes: vec![
                framed(1, "data:image/png;base64,***"),
                framed(2, "data:image/png;base64,aGVsbG8="),
                Scene::new(3, "Scene 3".into(), "close".into(), None),
            ],
        };

        let written = export_frames(&analysis, dir.path()).await.unwrap();
        assert_eq!(written, 1);
        assert!(!dir.path().join("shot_01_1.png").exists());
        let bytes = std::fs::read(dir.path().join("shot_02_2.png")).unwrap();
        assert_eq!(bytes, b"hello");
    }
}
