//! Model-backed seams of the conversation loop.
//!
//! Everything nondeterministic sits behind these traits so the runtime can
//! be exercised in tests with scripted implementations. A failing oracle is
//! never fatal: the runtime degrades to a clarifying question and keeps the
//! stored state untouched.

use async_trait::async_trait;
use thiserror::Error;

use parkbot_core::{Classification, DialogueTurn, ExtractedFields};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model response was not usable: {0}")]
    Malformed(String),
    #[error("model request timed out after {0}s")]
    Timeout(u64),
}

/// Decides what a free-form message is about.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        history: &[DialogueTurn],
    ) -> Result<Classification, OracleError>;
}

/// Pulls booking slots out of a message. Absent fields stay `None`; the
/// extractor never reports a field it is unsure about.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        history: &[DialogueTurn],
    ) -> Result<ExtractedFields, OracleError>;
}

/// Context handed to the reply generator alongside the message.
#[derive(Clone, Debug, Default)]
pub struct ReplyContext {
    pub mode: &'static str,
    pub park: String,
    /// Slots the current draft still needs, so the reply can ask for them.
    pub missing_fields: Vec<&'static str>,
    pub knowledge: Vec<String>,
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn reply(
        &self,
        text: &str,
        history: &[DialogueTurn],
        context: &ReplyContext,
    ) -> Result<String, OracleError>;
}

/// Looks up park facts (hours, prices, rooms) relevant to a question.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn lookup(&self, text: &str) -> Result<Vec<String>, OracleError>;
}

/// Retriever for deployments without a knowledge base.
pub struct NoKnowledge;

#[async_trait]
impl KnowledgeRetriever for NoKnowledge {
    async fn lookup(&self, _text: &str) -> Result<Vec<String>, OracleError> {
        Ok(Vec::new())
    }
}
