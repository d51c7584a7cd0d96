//! Composite request building: subject photo + scene background + prompt.

use crate::config::{ProcessingConfig, SubjectMode};
use crate::error::Result;
use crate::gemini::{GenerationConfig, GenerationRequest, GenerationResponse, ImageConfig, Part};
use crate::raster::RasterImage;
use crate::scenes::{ImageFetcher, scene};
use tracing::{debug, instrument};

pub const PROMPT_TEMPLATE: &str = r#"
You are a professional cinematic compositor for the HKAPA Film & TV Library.
Your task is to create a hyper-realistic photo composite.

Inputs:
1. An image of a user (or group).
2. A background image of a historical architectural setting.

Primary Goal:
Seamlessly integrate the subject into the environment with perfect perspective and scale.

Instructions:
1. **Perspective & Scale Analysis (CRITICAL):**
   - Analyze the vanishing point and floor plane of the background image.
   - Scale the subject so their height is realistic relative to the surrounding architecture (e.g., bookshelves, doorways, tables).
   - Ensure the subject appears to be standing *inside* the 3D space of the room, not floating on top.
   - Align the subject's feet firmly with the perspective of the floor carpet/tiles.

2. **Lighting Match:**
   - Completely re-grade the subject's lighting to match the background.
   - If the background is warm/golden, the subject must be warm/golden.
   - Add rim lighting to the subject's edges corresponding to the light sources in the background.

3. **Shadow Integration:**
   - Generate realistic cast shadows on the floor extending from the subject's feet, matching the direction of shadows in the scene.
   - Add ambient occlusion (contact shadows) where feet touch the ground.

4. **blending:**
   - Match the depth of field. If the background is slightly soft, soften the subject edges slightly to match.

Specific Constraints:
- Mode: {{SUBJECT_MODE}}
- Pose: {{POSE_INSTRUCTION}}
"#;

pub const FAMILY_MODE_INSTRUCTION: &str =
    "Ensure children and strollers are preserved and naturally integrated into the floor space.";

const SUBJECT_PLACEHOLDER: &str = "{{SUBJECT_MODE}}";
const POSE_PLACEHOLDER: &str = "{{POSE_INSTRUCTION}}";

/// Fills the template for `config`'s subject and pose modes.
pub fn build_prompt(config: &ProcessingConfig) -> String {
    let mut prompt = PROMPT_TEMPLATE
        .replacen(SUBJECT_PLACEHOLDER, config.subject_mode.label(), 1)
        .replacen(POSE_PLACEHOLDER, config.pose_mode.instruction(), 1);

    if config.subject_mode == SubjectMode::Family {
        prompt.push_str("\n ");
        prompt.push_str(FAMILY_MODE_INSTRUCTION);
    }

    prompt
}

/// Image options the selected tier accepts, or `None` if there are none to send.
pub fn generation_options(config: &ProcessingConfig) -> Option<GenerationConfig> {
    let tier = config.tier;
    let image_size = config
        .image_size
        .filter(|_| tier.supports_image_size())
        .map(|s| s.as_str().to_string());
    let aspect_ratio = config
        .aspect_ratio
        .filter(|_| tier.supports_aspect_ratio())
        .map(|r| r.as_str().to_string());

    if image_size.is_none() && aspect_ratio.is_none() {
        return None;
    }

    Some(GenerationConfig {
        image_config: Some(ImageConfig {
            image_size,
            aspect_ratio,
        }),
    })
}

/// Assembles the request from an already-fetched background.
///
/// Parts are ordered prompt, subject, background.
pub fn compose_request(subject: &RasterImage, background: &RasterImage, config: &ProcessingConfig) -> GenerationRequest {
    let prompt = build_prompt(config);
    debug!(
        prompt_len = prompt.len(),
        subject_len = subject.len(),
        background_len = background.len(),
        "built composite request"
    );

    let mut request = GenerationRequest::new(
        config.tier.model_id(),
        vec![Part::text(prompt), Part::image(subject), Part::image(background)],
    );
    request.generation_config = generation_options(config);
    request
}

/// Fetches the configured scene's reference image and builds the request.
///
/// # Errors
///
/// Propagates the fetcher's error, normally
/// [`AppError::SceneFetchFailed`](crate::AppError::SceneFetchFailed).
#[instrument(skip_all, fields(scene = %config.scene, tier = ?config.tier))]
pub async fn build_composite<F: ImageFetcher>(
    subject: &RasterImage,
    config: &ProcessingConfig,
    fetcher: &F,
) -> Result<GenerationRequest> {
    let background = fetcher.fetch(scene(config.scene).url).await?;
    Ok(compose_request(subject, &background, config))
}

/// The composite image from a generation response.
///
/// # Errors
///
/// [`AppError::NoImageInResponse`](crate::AppError::NoImageInResponse) when
/// the first candidate carries no inline image.
pub fn parse_composite(response: &GenerationResponse) -> Result<RasterImage> {
    response.first_image()
}
