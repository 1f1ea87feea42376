// src/services/gemini_service.rs
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::BoothConfig;
use crate::errors::BoothError;
use crate::models::EncodedImage;

/// The external generative capability, consumed as an opaque service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Submits one instruction with one source image. Returns every image
    /// payload found in the response, possibly none.
    async fn generate_images(
        &self,
        instruction: &str,
        source: &EncodedImage,
    ) -> Result<Vec<EncodedImage>, BoothError>;

    /// Text-only request returning the model's reply.
    async fn generate_text(&self, prompt: &str) -> Result<String, BoothError>;
}

pub struct GeminiService {
    api_key: String,
    api_base: String,
    image_model: String,
    text_model: String,
    client: Client,
}

impl GeminiService {
    pub fn new(config: &BoothConfig) -> Result<Self, BoothError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BoothError::LLM(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            image_model: config.image_model.clone(),
            text_model: config.text_model.clone(),
            client,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }

    async fn generate_content(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<GenerateContentResponse, BoothError> {
        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BoothError::LLM(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BoothError::LLM(format!(
                "Gemini API error status {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| BoothError::LLM(format!("Failed to parse Gemini response: {}", e)))
    }
}

#[async_trait]
impl GenerationBackend for GeminiService {
    async fn generate_images(
        &self,
        instruction: &str,
        source: &EncodedImage,
    ) -> Result<Vec<EncodedImage>, BoothError> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": instruction },
                    {
                        "inlineData": {
                            "mimeType": source.mime_type,
                            "data": source.base64()
                        }
                    }
                ]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE", "TEXT"]
            }
        });

        let response = self.generate_content(&self.image_model, body).await?;
        let images = response.images()?;
        debug!("Gemini returned {} image part(s)", images.len());
        Ok(images)
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, BoothError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self.generate_content(&self.text_model, body).await?;
        response
            .text()
            .ok_or_else(|| BoothError::LLM("No text in Gemini response".to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    #[serde(default)]
    data: String,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// Image payloads of the first candidate, in response order.
    pub(crate) fn images(&self) -> Result<Vec<EncodedImage>, BoothError> {
        self.first_parts()
            .iter()
            .filter_map(|part| part.inline_data.as_ref())
            .filter(|inline| !inline.data.is_empty())
            .map(|inline| EncodedImage::from_base64(&inline.data, &inline.mime_type))
            .collect()
    }

    pub(crate) fn text(&self) -> Option<String> {
        let text: String = self
            .first_parts()
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}
