//! Answer provider backed by a remote chat-completion API
//!
//! [`AnswerProvider::ask`] never fails: any transport, status, or parse
//! error is absorbed into one of the fixed [`FALLBACK_ANSWERS`].

use async_trait::async_trait;
use rand::seq::SliceRandom;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::AnswerConfig;
use crate::{Error, Result};

/// Canned answers used when the remote API is unreachable or errors
pub const FALLBACK_ANSWERS: [&str; 5] = [
    "你好！我是學習先生。我很高興回答你的問題。",
    "地球是圓的，就像一個大球。它繞著太陽轉動。",
    "恐龍是很久以前生活在地球上的大動物。牠們已經滅絕了。",
    "彩虹是因為陽光通過雨滴而形成的。它有七種顏色。",
    "星星是在太空中的大火球，就像我們的太陽一樣。",
];

/// Fixed system prompt constraining language, length and tone
pub const SYSTEM_PROMPT: &str = "You are Mr. Learning, an educational assistant for children aged 5+. Respond in Cantonese with these guidelines:
1. Be intellectual and accurate - do not oversimplify concepts
2. Use simple, clear wording that children can understand
3. Keep answers concise, precise and to the point (maximum 3-4 sentences)
4. Avoid personal notes, opinions or unrelated thoughts
5. Be creative with explanations when needed
6. Focus purely on delivering factual, educational content
7. Do not use phrases like 'As Mr. Learning' or refer to yourself
8. Respond directly to the question without preamble";

/// Produces an answer for a child's question
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Answer a question; always resolves to a non-empty string
    async fn ask(&self, question: &str) -> String;
}

/// Pick one fallback answer uniformly at random
#[must_use]
pub fn fallback_answer() -> &'static str {
    FALLBACK_ANSWERS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK_ANSWERS[0])
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completion client (`POST /v1/chat/completions`)
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl ChatCompletionsProvider {
    /// Create a provider from configuration
    ///
    /// A missing API key is allowed; every question then gets a fallback.
    #[must_use]
    pub fn new(config: &AnswerConfig) -> Self {
        if config.api_key.is_none() {
            tracing::warn!("no completion API key configured, answers will use fallbacks");
        }

        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn request_body<'a>(&'a self, question: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: question,
                },
            ],
            temperature: self.temperature,
        }
    }

    /// Single request, no retry
    async fn try_ask(&self, question: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("completion API key not configured".to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            )
            .json(&self.request_body(question))
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = %status, "received completion response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Answer(format!("API error {status}: {body}")));
        }

        let body = response.text().await?;
        parse_answer(&body)
    }
}

#[async_trait]
impl AnswerProvider for ChatCompletionsProvider {
    async fn ask(&self, question: &str) -> String {
        tracing::info!(question, model = %self.model, "asking");

        match self.try_ask(question).await {
            Ok(answer) => {
                tracing::info!(answer_len = answer.len(), "answer received");
                answer
            }
            Err(e) => {
                tracing::warn!(error = %e, "completion failed, using fallback answer");
                fallback_answer().to_string()
            }
        }
    }
}

/// Extract `choices[0].message.content` from a completion response body
fn parse_answer(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let answer = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    if answer.is_empty() {
        return Err(Error::Answer("response has no answer content".to_string()));
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AnswerConfig {
        AnswerConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            api_key: Some(SecretString::from("test-key".to_string())),
            model: "grok-3".to_string(),
            max_tokens: 150,
            temperature: 0.7,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let provider = ChatCompletionsProvider::new(&test_config());
        let json = serde_json::to_value(provider.request_body("What is the moon?")).unwrap();

        assert_eq!(json["model"], "grok-3");
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "What is the moon?");
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_parse_answer() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" 月亮係地球嘅衛星。 "}}]}"#;
        assert_eq!(parse_answer(body).unwrap(), "月亮係地球嘅衛星。");
    }

    #[test]
    fn test_parse_answer_rejects_malformed() {
        assert!(parse_answer("not json").is_err());
        assert!(parse_answer(r#"{"choices":[]}"#).is_err());
        assert!(parse_answer(r#"{"choices":[{"message":{"content":null}}]}"#).is_err());
    }

    #[test]
    fn test_fallback_is_from_fixed_set() {
        for _ in 0..20 {
            assert!(FALLBACK_ANSWERS.contains(&fallback_answer()));
        }
    }

    #[tokio::test]
    async fn test_missing_key_falls_back() {
        let mut config = test_config();
        config.api_key = None;
        let provider = ChatCompletionsProvider::new(&config);

        let answer = provider.ask("What is the moon?").await;
        assert!(FALLBACK_ANSWERS.contains(&answer.as_str()));
    }
}
