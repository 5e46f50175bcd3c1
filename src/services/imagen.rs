use crate::core::config::ImageConfig;
use crate::core::error::ProviderError;
use crate::core::state::Image;
use crate::services::llm::classify_failure;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Largest number of images a provider returns for one call.
pub const MAX_IMAGES_PER_CALL: u32 = 4;

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates `count` images (at most [`MAX_IMAGES_PER_CALL`]) in one call.
    async fn generate_images(&self, prompt: &str, count: u32) -> Result<Vec<Image>, ProviderError>;
}

pub fn create_image_provider(config: &ImageConfig) -> Result<Box<dyn ImageProvider>> {
    match config.provider.as_str() {
        "gemini" => {
            let cfg = config.gemini.as_ref().context("Imagen config missing")?;
            Ok(Box::new(ImagenClient::new(&cfg.api_key, &cfg.model)))
        }
        "openai" => {
            let cfg = config.openai.as_ref().context("OpenAI image config missing")?;
            Ok(Box::new(OpenAIImageClient::new(
                &cfg.api_key,
                &cfg.model,
                cfg.base_url.as_deref(),
                &cfg.size,
            )))
        }
        _ => Err(anyhow!("Unknown image provider: {}", config.provider)),
    }
}

fn decode_payload(mime_type: &str, encoded: &str) -> Result<Image> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("Image payload is not valid base64")?;
    Image::from_encoded(mime_type, bytes)
}

// --- Gemini Imagen ---
struct ImagenClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl ImagenClient {
    fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ImagenRequest {
    instances: Vec<ImagenInstance>,
    parameters: ImagenParameters,
}

#[derive(Serialize)]
struct ImagenInstance {
    prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenParameters {
    sample_count: u32,
    output_options: ImagenOutputOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenOutputOptions {
    mime_type: String,
}

#[derive(Deserialize)]
struct ImagenResponse {
    #[serde(default)]
    predictions: Vec<ImagenPrediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagenPrediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
    rai_filtered_reason: Option<String>,
}

fn imagen_images(response: ImagenResponse) -> Result<Vec<Image>> {
    let mut images = Vec::with_capacity(response.predictions.len());
    for prediction in response.predictions {
        match prediction.bytes_base64_encoded {
            Some(data) => {
                let mime = prediction.mime_type.as_deref().unwrap_or("image/png");
                images.push(decode_payload(mime, &data)?);
            }
            None => {
                let reason = prediction.rai_filtered_reason.unwrap_or_default();
                log::warn!("Imagen dropped a candidate: {}", reason);
            }
        }
    }
    if images.is_empty() {
        return Err(anyhow!("Imagen returned no images"));
    }
    Ok(images)
}

#[async_trait]
impl ImageProvider for ImagenClient {
    async fn generate_images(&self, prompt: &str, count: u32) -> Result<Vec<Image>, ProviderError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:predict",
            self.model
        );

        let request_body = ImagenRequest {
            instances: vec![ImagenInstance {
                prompt: prompt.to_string(),
            }],
            parameters: ImagenParameters {
                sample_count: count.min(MAX_IMAGES_PER_CALL),
                output_options: ImagenOutputOptions {
                    mime_type: "image/png".to_string(),
                },
            },
        };

        log::debug!("Imagen request for {} image(s)", count);
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await?;
            return Err(classify_failure("Imagen", status.as_u16(), &error_text));
        }

        let result: ImagenResponse = resp.json().await?;
        Ok(imagen_images(result)?)
    }
}

// --- OpenAI ---
struct OpenAIImageClient {
    api_key: String,
    model: String,
    base_url: String,
    size: String,
    client: reqwest::Client,
}

impl OpenAIImageClient {
    fn new(api_key: &str, model: &str, base_url: Option<&str>, size: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            size: size.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAIImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    response_format: String,
}

#[derive(Deserialize)]
struct OpenAIImageResponse {
    data: Vec<OpenAIImageData>,
}

#[derive(Deserialize)]
struct OpenAIImageData {
    b64_json: Option<String>,
}

#[async_trait]
impl ImageProvider for OpenAIImageClient {
    async fn generate_images(&self, prompt: &str, count: u32) -> Result<Vec<Image>, ProviderError> {
        let url = format!("{}/images/generations", self.base_url);

        let request_body = OpenAIImageRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            n: count.min(MAX_IMAGES_PER_CALL),
            size: self.size.clone(),
            response_format: "b64_json".to_string(),
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await?;
            return Err(classify_failure("OpenAI", status.as_u16(), &error_text));
        }

        let result: OpenAIImageResponse = resp.json().await?;
        let mut images = Vec::with_capacity(result.data.len());
        for item in result.data {
            let data = item
                .b64_json
                .ok_or_else(|| anyhow!("OpenAI image response missing b64_json"))?;
            images.push(decode_payload("image/png", &data)?);
        }
        Ok(images)
    }
}
