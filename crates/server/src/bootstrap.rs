use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use parkbot_agent::{
    AgentRuntime, ChainClassifier, HttpLlmClient, IncomingMessage, LlmFieldExtractor,
    LlmIntentClassifier, LlmReplyGenerator, NoKnowledge, NoopCrm, OracleError, RuntimeSettings,
};
use parkbot_channels::{
    ChannelPoller, HandlerError, MessageHandler, NoopTransport, ReconnectPolicy, TelegramTransport,
    VkTransport,
};
use parkbot_core::config::{AppConfig, ConfigError, LoadOptions};
use parkbot_core::Channel;
use parkbot_db::{
    connect_from_config, migrations, DbPool, IdentityEngine, LeadManager, SqlSessionStore,
};

use crate::crm::HttpCrm;
use crate::notify::TelegramNotifier;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
    pub pollers: Vec<ChannelPoller>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client initialization failed: {0}")]
    Llm(#[source] OracleError),
    #[error("crm client initialization failed: {0}")]
    Crm(#[source] parkbot_agent::CrmError),
}

/// Adapts the channel poller's handler seam to the agent runtime.
struct RuntimeHandler {
    runtime: Arc<AgentRuntime>,
}

#[async_trait]
impl MessageHandler for RuntimeHandler {
    async fn handle(
        &self,
        message: parkbot_channels::InboundMessage,
    ) -> Result<Vec<String>, HandlerError> {
        let incoming = IncomingMessage {
            identity: message.identity,
            text: message.text,
            hints: message.hints,
        };
        let reply = self
            .runtime
            .handle_message(incoming)
            .await
            .map_err(|err| HandlerError::Failed(err.to_string()))?;
        Ok(reply.texts)
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "bootstrap_started", "starting application bootstrap");

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "migrations_applied", "database migrations applied");

    let runtime = Arc::new(build_runtime(&config, db_pool.clone())?);
    let pollers = build_pollers(&config, runtime.clone());

    Ok(Application { config, db_pool, runtime, pollers })
}

fn build_runtime(config: &AppConfig, db_pool: DbPool) -> Result<AgentRuntime, BootstrapError> {
    let llm = HttpLlmClient::new(config.llm.clone()).map_err(BootstrapError::Llm)?;

    let classifier = ChainClassifier::new(Arc::new(LlmIntentClassifier::new(llm.clone())));
    let extractor = LlmFieldExtractor::new(llm.clone());
    let replier = LlmReplyGenerator::new(llm);

    let notifier = TelegramNotifier::new(
        config.telegram.bot_token.clone(),
        config.telegram.staff_chat_id.clone(),
    );

    let crm: Arc<dyn parkbot_agent::CrmSync> = if config.crm.enabled {
        // Validation guarantees base_url and api_key when crm.enabled is set.
        let base_url = config.crm.base_url.clone().unwrap_or_default();
        let api_key = config.crm.api_key.clone().unwrap_or_else(|| String::new().into());
        Arc::new(
            HttpCrm::new(base_url, api_key, config.crm.pipeline.clone(), config.crm.timeout_secs)
                .map_err(BootstrapError::Crm)?,
        )
    } else {
        Arc::new(NoopCrm)
    };

    Ok(AgentRuntime::new(
        IdentityEngine::new(db_pool.clone()),
        LeadManager::new(db_pool.clone()),
        Arc::new(SqlSessionStore::new(db_pool)),
        Arc::new(classifier),
        Arc::new(extractor),
        Arc::new(replier),
        Arc::new(NoKnowledge),
        Arc::new(notifier),
        crm,
        RuntimeSettings {
            park: config.business.park.clone(),
            contact_phone: config.business.contact_phone.clone(),
            history_turns: config.business.history_turns,
        },
    ))
}

fn build_pollers(config: &AppConfig, runtime: Arc<AgentRuntime>) -> Vec<ChannelPoller> {
    let mut pollers = Vec::new();

    let telegram = TelegramTransport::new(config.telegram.bot_token.clone());
    pollers.push(ChannelPoller::new(
        Arc::new(telegram),
        Arc::new(RuntimeHandler { runtime: runtime.clone() }),
        ReconnectPolicy::default(),
    ));

    let vk_transport: Arc<dyn parkbot_channels::PollTransport> = match (
        config.vk.enabled,
        config.vk.access_token.clone(),
        config.vk.group_id,
    ) {
        (true, Some(access_token), Some(group_id)) => {
            Arc::new(VkTransport::new(access_token, group_id))
        }
        _ => Arc::new(NoopTransport::new(Channel::Vk)),
    };
    pollers.push(ChannelPoller::new(
        vk_transport,
        Arc::new(RuntimeHandler { runtime }),
        ReconnectPolicy::default(),
    ));

    pollers
}
