//! Per-scene generation state for the current project.
//!
//! `StoryboardState` owns the analysis result. A scene moves
//! `Idle -> Generating -> Succeeded | Failed` and can go back to `Generating`
//! any number of times. Every transition replaces the scene entry in one step.

use crate::credentials::{ensure_credential, CredentialProvider, CredentialStatus};
use crate::error::StoryboardError;
use crate::image::{ImageSize, SceneImageGenerator};
use crate::scene::{Scene, SceneId, ScriptAnalysisResult};
use tracing::{info, warn};

pub const REAUTHORIZE_MESSAGE: &str = "Please re-select your API key.";

/// What a single generation request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Succeeded,
    Failed(String),
    /// The key was rejected; the credential collaborator has been prompted and a
    /// new key was selected.
    AuthorizationRequired,
    /// The key was rejected and no replacement was selected at the prompt.
    ReauthorizationDeclined,
    /// No credential was selected, so nothing was sent and the scene is untouched.
    CredentialNotSelected,
    /// Unknown scene, or one that is already generating.
    Skipped,
}

/// Inputs for one image call, captured when a scene enters `Generating`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub scene_id: SceneId,
    pub visual_prompt: String,
    pub genre: String,
    pub size: ImageSize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateAllSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Scenes that already had a frame.
    pub skipped: usize,
    /// The run stopped because no usable credential could be selected.
    pub aborted: bool,
}

#[derive(Debug, Default)]
pub struct StoryboardState {
    analysis: Option<ScriptAnalysisResult>,
    image_size: ImageSize,
}

impl StoryboardState {
    pub fn analysis(&self) -> Option<&ScriptAnalysisResult> {
        self.analysis.as_ref()
    }

    /// Replace the current project with a fresh analysis.
    pub fn load_analysis(&mut self, analysis: ScriptAnalysisResult) {
        info!(
            "Loaded \"{}\" with {} scenes",
            analysis.title,
            analysis.scenes.len()
        );
        self.analysis = Some(analysis);
    }

    /// Drop the current project and return to the pre-analysis state.
    pub fn abandon_project(&mut self) {
        if let Some(analysis) = self.analysis.take() {
            info!("Abandoned project \"{}\"", analysis.title);
        }
    }

    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    pub fn set_image_size(&mut self, size: ImageSize) {
        self.image_size = size;
    }

    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.analysis.as_ref().and_then(|analysis| analysis.scene(id))
    }

    /// Move a scene into `Generating` and hand back what the image call needs.
    ///
    /// Returns `None` for unknown scenes and scenes already in flight.
    pub fn begin_generation(&mut self, id: SceneId) -> Option<GenerationJob> {
        let image_size = self.image_size;
        let analysis = self.analysis.as_mut()?;
        let scene = analysis.scene(id)?;
        if scene.is_generating {
            return None;
        }

        let job = GenerationJob {
            scene_id: id,
            visual_prompt: scene.visual_prompt.clone(),
            genre: analysis.genre.clone(),
            size: image_size,
        };
        let updated = scene.clone().into_generating();
        analysis.replace_scene(updated);
        Some(job)
    }

    /// Record the result of an image call and leave the scene out of `Generating`.
    pub fn complete_generation(
        &mut self,
        id: SceneId,
        result: crate::error::Result<String>,
    ) -> GenerationOutcome {
        let Some(analysis) = self.analysis.as_mut() else {
            return GenerationOutcome::Skipped;
        };
        let Some(scene) = analysis.scene(id).cloned() else {
            return GenerationOutcome::Skipped;
        };

        let (updated, outcome) = match result {
            Ok(image_url) => {
                info!("Scene {} frame ready", scene.scene_number);
                (scene.into_succeeded(image_url), GenerationOutcome::Succeeded)
            }
            Err(StoryboardError::AuthorizationRequired(detail)) => {
                warn!(
                    "Scene {} rejected by the service, key must be re-selected: {}",
                    scene.scene_number, detail
                );
                (
                    scene.into_failed(REAUTHORIZE_MESSAGE.to_string()),
                    GenerationOutcome::AuthorizationRequired,
                )
            }
            Err(e) => {
                let message = match e {
                    StoryboardError::ImageGenerationFailure(detail) => {
                        format!("Image generation failed: {}", detail)
                    }
                    other => format!("Image generation failed: {}", other),
                };
                warn!("Scene {}: {}", scene.scene_number, message);
                (
                    scene.into_failed(message.clone()),
                    GenerationOutcome::Failed(message),
                )
            }
        };

        analysis.replace_scene(updated);
        outcome
    }

    /// Generate (or regenerate) one scene's frame.
    pub async fn request_single_generation(
        &mut self,
        id: SceneId,
        images: &dyn SceneImageGenerator,
        credentials: &dyn CredentialProvider,
    ) -> GenerationOutcome {
        match self.scene(id) {
            None => return GenerationOutcome::Skipped,
            Some(scene) if scene.is_generating => return GenerationOutcome::Skipped,
            Some(_) => {}
        }

        if ensure_credential(credentials).await == CredentialStatus::NotSelected {
            return GenerationOutcome::CredentialNotSelected;
        }

        let Some(job) = self.begin_generation(id) else {
            return GenerationOutcome::Skipped;
        };

        let result = images
            .generate_image(&job.visual_prompt, job.size, &job.genre)
            .await;
        let outcome = self.complete_generation(job.scene_id, result);

        if outcome == GenerationOutcome::AuthorizationRequired
            && !credentials.select_credential().await
        {
            warn!("No replacement API key was selected");
            return GenerationOutcome::ReauthorizationDeclined;
        }
        outcome
    }

    /// Generate every scene that has no frame yet, one at a time, in scene order.
    pub async fn request_generate_all(
        &mut self,
        images: &dyn SceneImageGenerator,
        credentials: &dyn CredentialProvider,
    ) -> GenerateAllSummary {
        let mut summary = GenerateAllSummary::default();
        let ids = match &self.analysis {
            Some(analysis) => analysis.scene_ids(),
            None => return summary,
        };
        let total = ids.len();

        for (idx, id) in ids.into_iter().enumerate() {
            if self.scene(id).map_or(true, Scene::has_image) {
                summary.skipped += 1;
                continue;
            }

            info!("Generating frame {}/{}", idx + 1, total);
            match self.request_single_generation(id, images, credentials).await {
                GenerationOutcome::Succeeded => summary.succeeded += 1,
                GenerationOutcome::Failed(_) | GenerationOutcome::AuthorizationRequired => {
                    summary.failed += 1
                }
                GenerationOutcome::ReauthorizationDeclined => {
                    warn!("Stopping: the API key was rejected and not replaced");
                    summary.failed += 1;
                    summary.aborted = true;
                    break;
                }
                GenerationOutcome::CredentialNotSelected => {
                    warn!("Stopping: no API key selected");
                    summary.aborted = true;
                    break;
                }
                GenerationOutcome::Skipped => summary.skipped += 1,
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests;
