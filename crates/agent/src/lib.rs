pub mod classify;
pub mod integrations;
pub mod keyed_lock;
pub mod llm;
pub mod oracle;
pub mod runtime;

pub use classify::{classify_by_rules, ChainClassifier};
pub use integrations::{CrmError, CrmSync, NoopCrm, NotifyError, StaffNotifier};
pub use keyed_lock::KeyedLocks;
pub use llm::{
    HttpLlmClient, LlmClient, LlmFieldExtractor, LlmIntentClassifier, LlmReplyGenerator,
};
pub use oracle::{
    FieldExtractor, IntentClassifier, KnowledgeRetriever, NoKnowledge, OracleError, ReplyContext,
    ReplyGenerator,
};
pub use runtime::{AgentRuntime, IncomingMessage, Reply, RuntimeError, RuntimeSettings};
