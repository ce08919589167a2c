//! OpenAI chat completions (JSON mode) and text-to-speech

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{prompts, sanitize_flashcards, StudyGenerator};
use crate::config::OpenAiConfig;
use crate::error::{Error, Result};
use crate::types::{Definition, FlashcardDraft, QuizQuestion, SummaryContent};

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

/// OpenAI-backed generator
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::Config("OpenAI API key is not set".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Run a JSON-mode chat completion and parse the message content
    async fn chat_json(&self, system: &str, user: &str, max_tokens: u32) -> Result<Value> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::generation(format!("OpenAI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "OpenAI chat failed ({}): {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("Failed to parse OpenAI response: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_else(|| "{}".to_string());

        parse_json_content(&content)
    }
}

fn parse_json_content(content: &str) -> Result<Value> {
    serde_json::from_str(content)
        .map_err(|e| Error::generation(format!("Model returned invalid JSON: {}", e)))
}

/// Items of `value[key]` that deserialize as `T`; others are skipped
fn parse_items<T: serde::de::DeserializeOwned>(value: &Value, key: &str) -> Vec<T> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_summary(value: Value) -> Result<SummaryContent> {
    let summary: SummaryContent = serde_json::from_value(value)
        .map_err(|e| Error::generation(format!("Unexpected summary shape: {}", e)))?;
    if summary.tldr.trim().is_empty() {
        return Err(Error::generation("Summary is missing a tl;dr"));
    }
    Ok(summary)
}

#[async_trait]
impl StudyGenerator for OpenAiClient {
    async fn summarize(&self, text: &str) -> Result<SummaryContent> {
        let value = self
            .chat_json(prompts::SUMMARY_SYSTEM, text, prompts::SUMMARY_MAX_TOKENS)
            .await?;
        parse_summary(value)
    }

    async fn quiz(&self, text: &str, tldr: &str) -> Result<Vec<QuizQuestion>> {
        let value = self
            .chat_json(
                &prompts::quiz_system(self.config.quiz_questions),
                &prompts::quiz_user(text, tldr),
                prompts::QUIZ_MAX_TOKENS,
            )
            .await?;
        Ok(parse_items(&value, "questions"))
    }

    async fn flashcards(
        &self,
        text: &str,
        definitions: &[Definition],
        key_concepts: &[String],
    ) -> Result<Vec<FlashcardDraft>> {
        let value = self
            .chat_json(
                prompts::FLASHCARD_SYSTEM,
                &prompts::flashcard_user(text, definitions, key_concepts),
                prompts::FLASHCARD_MAX_TOKENS,
            )
            .await?;
        Ok(sanitize_flashcards(parse_items(&value, "flashcards")))
    }

    async fn narrate(&self, script: &str) -> Result<Vec<u8>> {
        let request = SpeechRequest {
            model: &self.config.tts_model,
            voice: &self.config.voice,
            input: script,
        };

        let response = self
            .client
            .post(self.endpoint("audio/speech"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::generation(format!("OpenAI speech request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "OpenAI speech failed ({}): {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::generation(format!("Failed to read speech audio: {}", e)))?;
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "openai"
    }
}
