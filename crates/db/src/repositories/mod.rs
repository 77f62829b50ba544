use async_trait::async_trait;
use thiserror::Error;

use parkbot_core::domain::client::{Channel, Client, ClientChild, ClientId, ClientPhone, ProfileHints};
use parkbot_core::domain::lead::{Lead, LeadId, LeadStatus};
use parkbot_core::domain::session::{DialogueMode, DialogueTurn, Session, TurnRole};

pub mod client;
pub mod lead;
pub mod session;

pub use client::SqlClientStore;
pub use lead::SqlLeadStore;
pub use session::SqlSessionStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

/// Durable person records. Plain CRUD plus the lookups the identity
/// engine needs; the merge itself lives in [`crate::identity`].
#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn find_by_id(&self, id: ClientId) -> Result<Option<Client>, RepositoryError>;
    async fn find_by_channel(
        &self,
        channel: Channel,
        channel_user_id: &str,
    ) -> Result<Option<Client>, RepositoryError>;
    /// Matches the canonical phone against both the current-phone field and
    /// the phone history, oldest client first.
    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Client>, RepositoryError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Client>, RepositoryError>;
    async fn update(&self, client: &Client) -> Result<(), RepositoryError>;
    async fn delete(&self, id: ClientId) -> Result<(), RepositoryError>;
    /// Fills only fields the stored record is missing.
    async fn fill_profile(&self, id: ClientId, hints: &ProfileHints)
        -> Result<(), RepositoryError>;
    /// Inserts the (client, phone) pair or refreshes its last-used stamp.
    async fn record_phone(&self, id: ClientId, phone: &str) -> Result<(), RepositoryError>;
    async fn phones(&self, id: ClientId) -> Result<Vec<ClientPhone>, RepositoryError>;
    async fn children(&self, id: ClientId) -> Result<Vec<ClientChild>, RepositoryError>;
}

/// Booking inquiries. Creation and slot merges go through
/// [`crate::leads::LeadManager`]; this is the read/update surface.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn find_by_id(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError>;
    async fn list_for_client(&self, client_id: ClientId) -> Result<Vec<Lead>, RepositoryError>;
    async fn list_active_drafts(&self, channel_key: &str) -> Result<Vec<Lead>, RepositoryError>;
    async fn set_status(&self, id: LeadId, status: LeadStatus) -> Result<(), RepositoryError>;
    async fn set_deal_id(&self, id: LeadId, deal_id: &str) -> Result<(), RepositoryError>;
    async fn delete(&self, id: LeadId) -> Result<(), RepositoryError>;
}

/// Per-channel-identity conversational state and dialogue history.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_or_create(
        &self,
        channel_key: &str,
        username: Option<&str>,
        park: &str,
    ) -> Result<Session, RepositoryError>;
    async fn save_mode(&self, channel_key: &str, mode: &DialogueMode)
        -> Result<(), RepositoryError>;
    /// Explicit restart: mode back to unknown, scratch cleared, row kept.
    async fn reset(&self, channel_key: &str) -> Result<(), RepositoryError>;
    async fn append_turn(
        &self,
        session_id: i64,
        role: TurnRole,
        content: &str,
    ) -> Result<(), RepositoryError>;
    /// The last `limit` turns in chronological order.
    async fn recent_turns(
        &self,
        session_id: i64,
        limit: u32,
    ) -> Result<Vec<DialogueTurn>, RepositoryError>;
}
