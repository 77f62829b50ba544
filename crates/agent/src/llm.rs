//! HTTP completion client and the oracle implementations built on it.
//!
//! One `complete` seam covers all three providers; the oracle adapters
//! format prompts and parse the structured answers.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{json, Value};

use parkbot_core::config::{LlmConfig, LlmProvider};
use parkbot_core::{Classification, DialogueTurn, ExtractedFields, Intent};

use crate::oracle::{
    FieldExtractor, IntentClassifier, OracleError, ReplyContext, ReplyGenerator,
};

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, OracleError>;
}

#[derive(Clone)]
pub struct HttpLlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| OracleError::Request(err.to_string()))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(match self.config.provider {
            LlmProvider::OpenAi => "https://api.openai.com",
            LlmProvider::Anthropic => "https://api.anthropic.com",
            LlmProvider::Ollama => "http://localhost:11434",
        });
        let base = base.trim_end_matches('/');
        match self.config.provider {
            LlmProvider::OpenAi => format!("{base}/v1/chat/completions"),
            LlmProvider::Anthropic => format!("{base}/v1/messages"),
            LlmProvider::Ollama => format!("{base}/api/chat"),
        }
    }

    fn body(&self, system: &str, prompt: &str) -> Value {
        match self.config.provider {
            LlmProvider::OpenAi => json!({
                "model": self.config.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": prompt},
                ],
            }),
            LlmProvider::Anthropic => json!({
                "model": self.config.model,
                "max_tokens": 1024,
                "system": system,
                "messages": [{"role": "user", "content": prompt}],
            }),
            LlmProvider::Ollama => json!({
                "model": self.config.model,
                "stream": false,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": prompt},
                ],
            }),
        }
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        let text = match self.config.provider {
            LlmProvider::OpenAi => body
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str),
            LlmProvider::Anthropic => body.pointer("/content/0/text").and_then(Value::as_str),
            LlmProvider::Ollama => body.pointer("/message/content").and_then(Value::as_str),
        };
        text.map(str::to_string)
    }

    async fn request_once(&self, system: &str, prompt: &str) -> Result<String, OracleError> {
        let mut request = self.http.post(self.endpoint()).json(&self.body(system, prompt));

        if let Some(key) = &self.config.api_key {
            request = match self.config.provider {
                LlmProvider::OpenAi | LlmProvider::Ollama => {
                    request.bearer_auth(key.expose_secret())
                }
                LlmProvider::Anthropic => request
                    .header("x-api-key", key.expose_secret())
                    .header("anthropic-version", "2023-06-01"),
            };
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                OracleError::Timeout(self.config.timeout_secs)
            } else {
                OracleError::Request(err.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OracleError::Request(format!("status {status}: {detail}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| OracleError::Malformed(err.to_string()))?;
        self.extract_text(&body)
            .ok_or_else(|| OracleError::Malformed("completion text missing from response".into()))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, OracleError> {
        let mut last_error = OracleError::Request("no attempts made".into());
        for attempt in 0..=self.config.max_retries {
            match self.request_once(system, prompt).await {
                Ok(text) => return Ok(text),
                Err(error) => {
                    tracing::warn!(
                        event_name = "llm_attempt_failed",
                        attempt,
                        error = %error,
                        "completion attempt failed"
                    );
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }
}

fn render_history(history: &[DialogueTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pulls the first JSON object out of a completion, tolerating markdown
/// fences and prose around it.
fn first_json_object(text: &str) -> Result<Value, OracleError> {
    let start = text
        .find('{')
        .ok_or_else(|| OracleError::Malformed("no JSON object in completion".into()))?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + ch.len_utf8()];
                    return serde_json::from_str(candidate)
                        .map_err(|err| OracleError::Malformed(err.to_string()));
                }
            }
            _ => {}
        }
    }
    Err(OracleError::Malformed("unterminated JSON object in completion".into()))
}

const CLASSIFY_SYSTEM: &str = "You classify visitor messages for a family entertainment park. \
     Reply with one JSON object: {\"intent\": \"general|booking|events|unknown\", \
     \"confidence\": 0.0-1.0}. `booking` is a birthday or private party inquiry, `events` is a \
     school or corporate group inquiry, `general` is questions about hours, prices or rules.";

pub struct LlmIntentClassifier<C> {
    client: C,
}

impl<C: LlmClient> LlmIntentClassifier<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: LlmClient> IntentClassifier for LlmIntentClassifier<C> {
    async fn classify(
        &self,
        text: &str,
        history: &[DialogueTurn],
    ) -> Result<Classification, OracleError> {
        let prompt = format!("Conversation so far:\n{}\n\nMessage: {text}", render_history(history));
        let completion = self.client.complete(CLASSIFY_SYSTEM, &prompt).await?;
        let value = first_json_object(&completion)?;

        let intent = value
            .get("intent")
            .and_then(Value::as_str)
            .and_then(Intent::parse)
            .ok_or_else(|| OracleError::Malformed("intent field missing or unknown".into()))?;
        let confidence = value
            .get("confidence")
            .and_then(Value::as_f64)
            .map(|c| c.clamp(0.0, 1.0) as f32)
            .unwrap_or(0.5);

        Ok(Classification::new(intent, confidence))
    }
}

const EXTRACT_SYSTEM: &str = "You extract booking details from a park visitor's message. Reply \
     with one JSON object containing only the fields the message actually states: customer_name, \
     phone, child_name, child_age, event_date (ISO), event_time, room, kids_count, adults_count, \
     format, extras (array of strings). Omit anything not stated. Never guess.";

pub struct LlmFieldExtractor<C> {
    client: C,
}

impl<C: LlmClient> LlmFieldExtractor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: LlmClient> FieldExtractor for LlmFieldExtractor<C> {
    async fn extract(
        &self,
        text: &str,
        history: &[DialogueTurn],
    ) -> Result<ExtractedFields, OracleError> {
        let prompt = format!("Conversation so far:\n{}\n\nMessage: {text}", render_history(history));
        let completion = self.client.complete(EXTRACT_SYSTEM, &prompt).await?;
        let value = first_json_object(&completion)?;
        serde_json::from_value(value).map_err(|err| OracleError::Malformed(err.to_string()))
    }
}

const REPLY_SYSTEM: &str = "You are the friendly front desk of a family entertainment park. \
     Answer briefly and warmly in plain text. If booking details are still missing, ask for at \
     most one of them. Never invent prices or availability; if unsure, offer to have a manager \
     follow up.";

pub struct LlmReplyGenerator<C> {
    client: C,
}

impl<C: LlmClient> LlmReplyGenerator<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: LlmClient> ReplyGenerator for LlmReplyGenerator<C> {
    async fn reply(
        &self,
        text: &str,
        history: &[DialogueTurn],
        context: &ReplyContext,
    ) -> Result<String, OracleError> {
        let mut prompt = format!(
            "Park: {}\nConversation mode: {}\nConversation so far:\n{}\n",
            context.park,
            context.mode,
            render_history(history),
        );
        if !context.knowledge.is_empty() {
            prompt.push_str(&format!("Park facts:\n{}\n", context.knowledge.join("\n")));
        }
        if !context.missing_fields.is_empty() {
            prompt.push_str(&format!(
                "Booking details still needed: {}\n",
                context.missing_fields.join(", ")
            ));
        }
        prompt.push_str(&format!("\nMessage: {text}"));

        let reply = self.client.complete(REPLY_SYSTEM, &prompt).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(OracleError::Malformed("empty completion".into()));
        }
        Ok(reply.to_string())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parkbot_core::Intent;

    use super::{first_json_object, LlmClient, LlmFieldExtractor, LlmIntentClassifier};
    use crate::oracle::{FieldExtractor, IntentClassifier, OracleError};

    struct Scripted(&'static str);

    #[async_trait]
    impl LlmClient for Scripted {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, OracleError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn json_object_is_found_inside_markdown_fences() {
        let value = first_json_object("```json\n{\"intent\": \"booking\"}\n```").expect("parse");
        assert_eq!(value["intent"], "booking");
    }

    #[tokio::test]
    async fn classifier_parses_intent_and_clamps_confidence() {
        let classifier =
            LlmIntentClassifier::new(Scripted("{\"intent\": \"events\", \"confidence\": 1.7}"));
        let c = classifier.classify("corporate thing", &[]).await.expect("classify");
        assert_eq!(c.intent, Intent::Events);
        assert!(c.confidence <= 1.0);
    }

    #[tokio::test]
    async fn extractor_ignores_fields_the_model_omitted() {
        let extractor = LlmFieldExtractor::new(Scripted(
            "Sure! {\"kids_count\": 12, \"extras\": [\"photographer\"]}",
        ));
        let fields = extractor.extract("12 kids and a photographer", &[]).await.expect("extract");
        assert_eq!(fields.kids_count, Some(12));
        assert_eq!(fields.extras, vec!["photographer".to_string()]);
        assert_eq!(fields.customer_name, None);
    }

    #[tokio::test]
    async fn garbage_completion_is_a_malformed_error() {
        let classifier = LlmIntentClassifier::new(Scripted("I cannot help with that."));
        let result = classifier.classify("hi", &[]).await;
        assert!(matches!(result, Err(OracleError::Malformed(_))));
    }
}
