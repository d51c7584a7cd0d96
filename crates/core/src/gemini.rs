//! Gemini `generateContent` wire types and HTTP client.
//!
//! Only the subset of the REST schema the booth uses is modelled: ordered
//! text and inline-image parts going out, candidates with parts coming back,
//! plus the `imageConfig` generation options for image models.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::raster::RasterImage;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

/// Base64 image payload with its MIME type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    /// Anything else the API may send back (function calls, thoughts, ...).
    Other(serde_json::Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// An inline image part carrying `image`'s payload (never a data-URL header).
    pub fn image(image: &RasterImage) -> Self {
        Self::InlineData {
            inline_data: Blob {
                mime_type: image.mime_type().to_string(),
                data: image.to_base64(),
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

/// A complete request: target model plus the JSON body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(skip)]
    pub model: String,
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerationRequest {
    /// Single-turn user request with the given ordered parts.
    pub fn new(model: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            model: model.into(),
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: None,
        }
    }

    pub fn parts(&self) -> &[Part] {
        self.contents.first().map(|c| c.parts.as_slice()).unwrap_or(&[])
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerationResponse {
    /// The first inline image of the first candidate.
    ///
    /// Further image parts and later candidates are ignored so a given
    /// response always yields the same image.
    pub fn first_image(&self) -> Result<RasterImage> {
        let parts = self
            .candidates
            .first()
            .map(|c| c.content.parts.as_slice())
            .unwrap_or(&[]);

        parts
            .iter()
            .find_map(|part| match part {
                Part::InlineData { inline_data } => Some(inline_data),
                _ => None,
            })
            .ok_or(AppError::NoImageInResponse)
            .and_then(|blob| RasterImage::from_base64(blob.mime_type.clone(), &blob.data))
    }
}

/// Thin client over the REST endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: url::Url,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_timeout(config, None)
    }

    /// Builds a client whose requests give up after `timeout`.
    pub fn with_timeout(config: &Config, timeout: Option<Duration>) -> Result<Self> {
        let mut base = config.gemini_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = url::Url::parse(&base)
            .map_err(|e| AppError::config(format!("Invalid base URL: {}", e)))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| AppError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: config.gemini_api_key.clone(),
            base_url,
        })
    }

    /// Shared HTTP client, reusable for scene fetches and uploads.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn endpoint(&self, model: &str) -> Result<url::Url> {
        let model = model.strip_prefix("models/").unwrap_or(model);
        self.base_url
            .join(&format!("models/{}:generateContent", model))
            .map_err(|e| AppError::config(format!("Invalid model endpoint: {}", e)))
    }

    /// Sends one request and returns the decoded response. No retries.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let url = self.endpoint(&request.model)?;

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::gemini(status.as_u16(), api_error_message(&body)));
        }

        let parsed: GenerationResponse = response.json().await?;
        info!(candidates = parsed.candidates.len(), "generation finished");
        Ok(parsed)
    }
}

/// Pulls `error.message` out of a Google API error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_camel_case() {
        let image = RasterImage::new("image/jpeg", vec![1, 2, 3]);
        let mut request = GenerationRequest::new("gemini-2.5-flash-image", vec![Part::text("hi"), Part::image(&image)]);
        request.generation_config = Some(GenerationConfig {
            image_config: Some(ImageConfig {
                image_size: None,
                aspect_ratio: Some("9:16".into()),
            }),
        });

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("model").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "9:16");
        assert!(json["generationConfig"]["imageConfig"].get("imageSize").is_none());
    }

    #[test]
    fn first_image_skips_text_and_later_images() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[
            {"text":"here you go"},
            {"inlineData":{"mimeType":"image/png","data":"AQID"}},
            {"inlineData":{"mimeType":"image/jpeg","data":"BAUG"}}
        ]}}]}"#;
        let response: GenerationResponse = serde_json::from_str(body).unwrap();
        let image = response.first_image().unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.bytes(), &[1, 2, 3]);
    }

    #[test]
    fn text_only_response_has_no_image() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"sorry"}]}}]}"#;
        let response: GenerationResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(response.first_image(), Err(AppError::NoImageInResponse)));

        let empty: GenerationResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(empty.first_image(), Err(AppError::NoImageInResponse)));
    }

    #[test]
    fn error_message_is_extracted() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "API key not valid");
        assert_eq!(api_error_message("  bad gateway "), "bad gateway");
    }

    #[test]
    fn endpoint_strips_models_prefix() {
        let config = Config {
            gemini_api_key: "k".into(),
            gemini_base_url: "https://example.test/v1beta".into(),
            imgbb_api_key: None,
            font_path: None,
        };
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint("models/gemini-2.5-flash-image").unwrap().as_str(),
            "https://example.test/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }
}
