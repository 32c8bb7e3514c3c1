use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier assigned when an analysis is parsed. Unrelated to `scene_number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneId(Uuid);

impl SceneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene-{}", self.0)
    }
}

/// Where a scene is in its generation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStatus {
    Idle,
    Generating,
    Succeeded,
    Failed,
}

/// One storyboard frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: SceneId,
    /// Order hint from the model; may repeat or skip.
    pub scene_number: u32,
    pub description: String,
    /// English prompt with shot type and lighting.
    pub visual_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue_preview: Option<String>,
    /// `data:` reference of the last successful frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_generating: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Scene {
    pub fn new(
        scene_number: u32,
        description: String,
        visual_prompt: String,
        dialogue_preview: Option<String>,
    ) -> Self {
        Self {
            id: SceneId::new(),
            scene_number,
            description,
            visual_prompt,
            dialogue_preview,
            image_url: None,
            is_generating: false,
            error: None,
        }
    }

    pub fn status(&self) -> SceneStatus {
        if self.is_generating {
            SceneStatus::Generating
        } else if self.image_url.is_some() {
            SceneStatus::Succeeded
        } else if self.error.is_some() {
            SceneStatus::Failed
        } else {
            SceneStatus::Idle
        }
    }

    pub fn has_image(&self) -> bool {
        self.image_url.is_some()
    }

    // Transitions return a whole new entry so callers replace the scene in one step.

    pub fn into_generating(self) -> Self {
        Self {
            is_generating: true,
            error: None,
            ..self
        }
    }

    pub fn into_succeeded(self, image_url: String) -> Self {
        Self {
            is_generating: false,
            image_url: Some(image_url),
            error: None,
            ..self
        }
    }

    pub fn into_failed(self, error: String) -> Self {
        Self {
            is_generating: false,
            image_url: None,
            error: Some(error),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingPoint {
    pub label: String,
    /// Intensity in `1..=100`.
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptAnalysisResult {
    pub title: String,
    pub genre: String,
    pub pacing: Vec<PacingPoint>,
    pub scenes: Vec<Scene>,
}

impl ScriptAnalysisResult {
    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.id == id)
    }

    /// Swap in a new entry for the scene with the same id. Returns false if it is gone.
    pub fn replace_scene(&mut self, updated: Scene) -> bool {
        match self.scenes.iter_mut().find(|scene| scene.id == updated.id) {
            Some(slot) => {
                *slot = updated;
                true
            }
            None => false,
        }
    }

    pub fn scene_ids(&self) -> Vec<SceneId> {
        self.scenes.iter().map(|scene| scene.id).collect()
    }
}
