use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::{ApiKind, ModelConfig};
use crate::error::Error;

static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn get_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client")
    })
}

// OpenAI-compatible chat shape.

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// Google generateContent shape.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Sends one generation request to the configured endpoint and returns the
/// first text completion, trimmed.
pub async fn generate(
    cfg: &ModelConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String, Error> {
    match cfg.kind {
        ApiKind::OpenAi => generate_openai(cfg, system_prompt, user_prompt).await,
        ApiKind::Google => generate_google(cfg, system_prompt, user_prompt).await,
    }
}

async fn generate_openai(
    cfg: &ModelConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String, Error> {
    let request = chat_request(&cfg.model, system_prompt, user_prompt);
    let url = format!("{}/chat/completions", cfg.endpoint.trim_end_matches('/'));

    let response = get_client()
        .post(&url)
        .header("Authorization", format!("Bearer {}", cfg.key))
        .json(&request)
        .send()
        .await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(Error::Api(format!("status {}: {}", status, truncate(&body, 500))));
    }

    parse_chat_response(&body)
}

async fn generate_google(
    cfg: &ModelConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String, Error> {
    let request = generate_request(system_prompt, user_prompt);
    let url = format!(
        "{}/{}:generateContent?key={}",
        cfg.endpoint.trim_end_matches('/'),
        cfg.model,
        cfg.key
    );

    let response = get_client().post(&url).json(&request).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(Error::Api(format!("status {}: {}", status, truncate(&body, 500))));
    }

    parse_generate_response(&body)
}

fn chat_request<'a>(
    model: &'a str,
    system_prompt: &'a str,
    user_prompt: &'a str,
) -> ChatRequest<'a> {
    let mut messages = Vec::new();
    if !system_prompt.is_empty() {
        messages.push(ChatMessage { role: "system", content: system_prompt });
    }
    messages.push(ChatMessage { role: "user", content: user_prompt });
    ChatRequest { model, messages }
}

fn generate_request<'a>(system_prompt: &'a str, user_prompt: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content { parts: vec![Part { text: user_prompt }] }],
        system_instruction: (!system_prompt.is_empty())
            .then(|| Content { parts: vec![Part { text: system_prompt }] }),
    }
}

fn parse_chat_response(body: &str) -> Result<String, Error> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::Api(format!("unexpected response shape: {} - {}", e, truncate(body, 500))))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Api("no choices in response".to_string()))?;
    let content = choice
        .message
        .content
        .ok_or_else(|| Error::Api("no content in response message".to_string()))?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(Error::Api("empty content in response message".to_string()));
    }
    Ok(trimmed.to_string())
}

fn parse_generate_response(body: &str) -> Result<String, Error> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| Error::Api(format!("unexpected response shape: {} - {}", e, truncate(body, 500))))?;
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::Api("no candidates in response".to_string()))?;

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let text = parts
        .into_iter()
        .next()
        .and_then(|part| part.text)
        .unwrap_or_default();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(Error::Api(format!("no text in response (finish reason: {reason})")));
    }
    Ok(trimmed.to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
