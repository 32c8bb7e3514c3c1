use crate::api::{GenerateContentRequest, GenerationConfig, GenerativeModel};
use crate::error::{Result, StoryboardError};
use crate::scene::{PacingPoint, Scene, ScriptAnalysisResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Characters of script sent to the model; the rest is dropped.
pub const MAX_SCRIPT_CHARS: usize = 8000;

const ANALYSIS_INSTRUCTIONS: &str = r#"You are a senior film storyboard artist. Analyze the script below.

Return JSON that follows the response schema:
- title: the script title (invent one from the content if the script has none)
- genre: the film genre (e.g. science fiction, thriller, urban drama)
- pacing: an array describing the emotional/visual intensity across the script (label: section, value: 1-100)
- scenes: the storyboard shot list

For every scene's visualPrompt:
1. Name a concrete camera shot (wide shot, close-up, high angle, ...).
2. Describe the lighting (god rays, warm/cool contrast, hard light, soft light, ...).
3. Style: photorealistic cinematic concept art, professional film look, rich detail.
4. Write it in English, whatever language the script is in.

Script:
"#;

/// Turns raw script text into a typed shot list.
pub struct ScriptAnalysisClient {
    model: Arc<dyn GenerativeModel>,
    model_name: String,
}

impl ScriptAnalysisClient {
    pub fn new(model: Arc<dyn GenerativeModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }

    pub async fn analyze(&self, script_text: &str) -> Result<ScriptAnalysisResult> {
        let script = truncate_script(script_text);
        if script.len() < script_text.len() {
            warn!(
                "Script truncated to {} characters before analysis",
                MAX_SCRIPT_CHARS
            );
        }
        info!("Analyzing script ({} characters)...", script.chars().count());

        let request = build_analysis_request(script);
        let response = self
            .model
            .generate_content(&self.model_name, request)
            .await
            .map_err(|e| StoryboardError::AnalysisFailure(e.to_string()))?;

        let text = response.text().ok_or_else(|| {
            StoryboardError::AnalysisFailure("model returned no text".to_string())
        })?;
        debug!("Analysis response: {}", text);

        let result = parse_analysis(&text)?;
        info!(
            "Analysis complete: \"{}\" ({}), {} scenes",
            result.title,
            result.genre,
            result.scenes.len()
        );
        Ok(result)
    }
}

/// First `MAX_SCRIPT_CHARS` characters, cut on a char boundary.
pub fn truncate_script(text: &str) -> &str {
    match text.char_indices().nth(MAX_SCRIPT_CHARS) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub fn build_analysis_request(script: &str) -> GenerateContentRequest {
    GenerateContentRequest::user_text(format!("{ANALYSIS_INSTRUCTIONS}{script}"))
        .with_generation_config(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(analysis_schema()),
            image_config: None,
        })
}

pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "genre": { "type": "STRING" },
            "pacing": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "label": { "type": "STRING" },
                        "value": { "type": "NUMBER" }
                    },
                    "required": ["label", "value"]
                }
            },
            "scenes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "sceneNumber": { "type": "NUMBER" },
                        "description": {
                            "type": "STRING",
                            "description": "Short summary of the scene in the script's language"
                        },
                        "visualPrompt": {
                            "type": "STRING",
                            "description": "Detailed English prompt for the image model"
                        },
                        "dialoguePreview": {
                            "type": "STRING",
                            "description": "The key line of dialogue in the scene"
                        }
                    },
                    "required": ["sceneNumber", "description", "visualPrompt"]
                }
            }
        },
        "required": ["title", "genre", "scenes", "pacing"]
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisData {
    title: String,
    genre: String,
    pacing: Vec<PacingData>,
    scenes: Vec<SceneData>,
}

#[derive(Deserialize)]
struct PacingData {
    label: String,
    value: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneData {
    scene_number: f64,
    description: String,
    visual_prompt: String,
    #[serde(default)]
    dialogue_preview: Option<String>,
}

/// Parse the model's JSON and give every scene a fresh id and idle state.
pub fn parse_analysis(text: &str) -> Result<ScriptAnalysisResult> {
    // Structured output is usually bare JSON, but strip Markdown fences if present.
    let json_text = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let data: AnalysisData = serde_json::from_str(json_text).map_err(|e| {
        StoryboardError::AnalysisFailure(format!("failed to parse analysis JSON: {}", e))
    })?;

    let pacing = data
        .pacing
        .into_iter()
        .map(|p| PacingPoint {
            label: p.label,
            value: clamp_pacing(p.value),
        })
        .collect();

    let scenes = data
        .scenes
        .into_iter()
        .map(|s| {
            let dialogue = s
                .dialogue_preview
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty());
            Scene::new(
                normalize_scene_number(s.scene_number),
                s.description,
                s.visual_prompt,
                dialogue,
            )
        })
        .collect();

    Ok(ScriptAnalysisResult {
        title: data.title,
        genre: data.genre,
        pacing,
        scenes,
    })
}

fn clamp_pacing(value: f64) -> u8 {
    if value.is_nan() {
        return 1;
    }
    value.round().clamp(1.0, 100.0) as u8
}

fn normalize_scene_number(value: f64) -> u32 {
    if value.is_nan() {
        return 1;
    }
    value.round().clamp(1.0, u32::MAX as f64) as u32
}
