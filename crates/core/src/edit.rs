//! Natural-language edits of a finished image.
//!
//! Edits always go to the fast tier regardless of the tier used for the
//! composite, and carry no generation options.

use crate::config::GenerationTier;
use crate::error::{AppError, Result};
use crate::gemini::{GenerationRequest, GenerationResponse, Part};
use crate::raster::RasterImage;
use tracing::debug;

pub const EDIT_TIER: GenerationTier = GenerationTier::Fast;

/// Builds `[instruction, image]` for the fast model.
///
/// # Errors
///
/// [`AppError::EmptyInstruction`] if `instruction` is blank.
pub fn build_edit(image: &RasterImage, instruction: &str) -> Result<GenerationRequest> {
    let instruction = instruction.trim();
    if instruction.is_empty() {
        return Err(AppError::EmptyInstruction);
    }
    debug!(instruction, image_len = image.len(), "built edit request");

    Ok(GenerationRequest::new(
        EDIT_TIER.model_id(),
        vec![Part::text(instruction), Part::image(image)],
    ))
}

/// Same contract as [`parse_composite`](crate::composite::parse_composite).
pub fn parse_edit(response: &GenerationResponse) -> Result<RasterImage> {
    response.first_image()
}
