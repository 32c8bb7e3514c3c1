use crate::api::{GenerateContentRequest, GenerationConfig, GenerativeModel, ImageConfig};
use crate::error::{Result, StoryboardError};
use async_trait::async_trait;
use base64::engine::general_purpose;
use base64::Engine;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

pub const ASPECT_RATIO: &str = "16:9";
pub const DEFAULT_GENRE: &str = "Cinematic";
pub const NO_IMAGE_DATA: &str = "model returned no image data";

/// Output resolution tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ImageSize {
    #[default]
    #[value(name = "1K")]
    #[serde(rename = "1K")]
    OneK,
    #[value(name = "2K")]
    #[serde(rename = "2K")]
    TwoK,
    #[value(name = "4K")]
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces one storyboard frame as a `data:` reference.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SceneImageGenerator: Send + Sync {
    async fn generate_image(
        &self,
        visual_prompt: &str,
        size: ImageSize,
        genre: &str,
    ) -> Result<String>;
}

pub struct SceneImageClient {
    model: Arc<dyn GenerativeModel>,
    model_name: String,
}

impl SceneImageClient {
    pub fn new(model: Arc<dyn GenerativeModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }
}

#[async_trait]
impl SceneImageGenerator for SceneImageClient {
    async fn generate_image(
        &self,
        visual_prompt: &str,
        size: ImageSize,
        genre: &str,
    ) -> Result<String> {
        info!("Generating {} frame for prompt: {}", size, visual_prompt);

        let request = build_image_request(visual_prompt, size, genre);
        let response = self
            .model
            .generate_content(&self.model_name, request)
            .await
            .map_err(classify_image_error)?;

        let inline = response.first_inline_data().ok_or_else(|| {
            warn!("Image response carried no inline data");
            StoryboardError::ImageGenerationFailure(NO_IMAGE_DATA.to_string())
        })?;

        Ok(format!("data:{};base64,{}", inline.mime_type, inline.data))
    }
}

pub fn frame_prompt(visual_prompt: &str, genre: &str) -> String {
    let genre = if genre.trim().is_empty() {
        DEFAULT_GENRE
    } else {
        genre.trim()
    };
    format!(
        "Professional film storyboard frame. Genre: {genre}. Subject: {visual_prompt}. \
         Details: 8k resolution, cinematic lighting, dramatic composition, film grain, \
         highly detailed environment."
    )
}

pub fn build_image_request(visual_prompt: &str, size: ImageSize, genre: &str) -> GenerateContentRequest {
    GenerateContentRequest::user_text(frame_prompt(visual_prompt, genre)).with_generation_config(
        GenerationConfig {
            image_config: Some(ImageConfig {
                aspect_ratio: ASPECT_RATIO.to_string(),
                image_size: size.as_str().to_string(),
            }),
            ..GenerationConfig::default()
        },
    )
}

/// Split transport errors into "pick a key again" and "just retry".
pub fn classify_image_error(err: StoryboardError) -> StoryboardError {
    if err.indicates_invalid_credential() {
        StoryboardError::AuthorizationRequired(err.to_string())
    } else {
        match err {
            StoryboardError::ImageGenerationFailure(_) => err,
            other => StoryboardError::ImageGenerationFailure(other.to_string()),
        }
    }
}

/// A decoded `data:<mime>;base64,<payload>` reference.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

pub fn decode_data_url(url: &str) -> Result<DecodedImage> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| StoryboardError::InvalidDataUrl("missing data: prefix".into()))?;
    let (mime_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| StoryboardError::InvalidDataUrl("not base64 encoded".into()))?;
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| StoryboardError::InvalidDataUrl(e.to_string()))?;

    Ok(DecodedImage {
        mime_type: mime_type.to_string(),
        bytes,
    })
}
