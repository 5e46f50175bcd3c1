use crate::core::config::LlmConfig;
use crate::core::error::ProviderError;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

/// One text generation call.
#[derive(Debug, Clone, Default)]
pub struct TextRequest {
    pub prompt: String,
    pub system: Option<String>,
    /// JSON schema constraining the answer. `None` asks for free text.
    pub schema: Option<Value>,
}

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn generate(&self, request: &TextRequest) -> Result<String, ProviderError>;
}

/// Which configured model a client is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    Outline,
    Content,
}

fn pick_model<'a>(role: LlmRole, model: &'a str, content_model: Option<&'a str>) -> &'a str {
    match role {
        LlmRole::Outline => model,
        LlmRole::Content => content_model.unwrap_or(model),
    }
}

pub fn create_llm(config: &LlmConfig, role: LlmRole) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "gemini" => {
            let cfg = config.gemini.as_ref().context("Gemini config missing")?;
            let model = pick_model(role, &cfg.model, cfg.content_model.as_deref());
            Ok(Box::new(GeminiClient::new(&cfg.api_key, model)))
        }
        "ollama" => {
            let cfg = config.ollama.as_ref().context("Ollama config missing")?;
            let model = pick_model(role, &cfg.model, cfg.content_model.as_deref());
            Ok(Box::new(OllamaClient::new(&cfg.base_url, model)))
        }
        "openai" => {
            let cfg = config.openai.as_ref().context("OpenAI config missing")?;
            let model = pick_model(role, &cfg.model, cfg.content_model.as_deref());
            Ok(Box::new(OpenAIClient::new(
                &cfg.api_key,
                model,
                cfg.base_url.as_deref(),
            )))
        }
        _ => Err(anyhow!("Unknown LLM provider: {}", config.provider)),
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Maps a failed HTTP exchange to a provider error.
///
/// A 429 status or a `RESOURCE_EXHAUSTED` status object in the body marks
/// the failure as a rate limit.
pub(crate) fn classify_failure(provider: &str, status: u16, body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error);
    let exhausted = parsed
        .as_ref()
        .and_then(|e| e.status.as_deref())
        .map(|s| s == "RESOURCE_EXHAUSTED")
        .unwrap_or(false);
    let message = parsed
        .map(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    if status == 429 || exhausted {
        ProviderError::rate_limited(format!("{} ({}): {}", provider, status, message))
    } else {
        ProviderError::Other(anyhow!("{} API error ({}): {}", provider, status, message))
    }
}

// --- Gemini ---
#[derive(Debug)]
struct GeminiClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: String,
}

/// Gemini expects OpenAPI style upper-case type names.
fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = match (k.as_str(), v) {
                        ("type", Value::String(t)) => Value::String(t.to_uppercase()),
                        _ => to_gemini_schema(v),
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}

fn gemini_text(result: GeminiResponse, body: &str) -> Result<String, ProviderError> {
    if let Some(err) = result.error {
        if err.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
            return Err(ProviderError::rate_limited(err.message));
        }
        return Err(anyhow!("Gemini API returned error: {}", err.message).into());
    }

    if let Some(first) = result.candidates.as_ref().and_then(|c| c.first()) {
        if let Some(content) = &first.content {
            let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
            if !text.is_empty() {
                return Ok(text);
            }
        }
        let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
        return Err(anyhow!("Gemini response empty. Finish reason: {}", reason).into());
    }

    Err(anyhow!("Gemini response format unexpected or empty. Body: {}", body).into())
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: &TextRequest) -> Result<String, ProviderError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: request.system.as_ref().map(|s| GeminiSystemInstruction {
                parts: vec![GeminiPart { text: s.clone() }],
            }),
            generation_config: request.schema.as_ref().map(|s| GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: to_gemini_schema(s),
            }),
        };

        log::debug!("Gemini request to model {}", self.model);
        let resp = self.client.post(&url).json(&request_body).send().await?;

        let status = resp.status();
        let response_text = resp.text().await?;
        if !status.is_success() {
            return Err(classify_failure("Gemini", status.as_u16(), &response_text));
        }

        let result: GeminiResponse = serde_json::from_str(&response_text).map_err(|e| {
            anyhow!(
                "Failed to parse Gemini response: {}. Body: {}",
                e,
                response_text
            )
        })?;
        gemini_text(result, &response_text)
    }
}

// --- Ollama ---
#[derive(Debug)]
struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Value>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

fn chat_messages(request: &TextRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.prompt.clone(),
    });
    messages
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, request: &TextRequest) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);

        let request_body = OllamaRequest {
            model: self.model.clone(),
            messages: chat_messages(request),
            stream: false,
            format: request.schema.clone(),
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await?;
            return Err(classify_failure("Ollama", status.as_u16(), &error_text));
        }

        let result: OllamaResponse = resp.json().await?;
        Ok(result.message.content)
    }
}

// --- OpenAI ---

#[derive(Debug)]
struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
    fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

fn openai_response_format(schema: &Value) -> Value {
    serde_json::json!({
        "type": "json_schema",
        "json_schema": {
            "name": "structured_response",
            "schema": schema,
        }
    })
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn generate(&self, request: &TextRequest) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages: chat_messages(request),
            response_format: request.schema.as_ref().map(openai_response_format),
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

        let result: OpenAIResponse = resp.json().await?;
        if let Some(content) = result.choices.first().and_then(|c| c.message.content.as_ref()) {
            return Ok(content.clone());
        }

        Err(anyhow!("OpenAI response empty or missing content").into())
    }
}
