//! Outbound seams: the staff chat and the CRM. Implementations live in the
//! server crate; the runtime only sees these traits so tests can script
//! both sides.

use async_trait::async_trait;
use thiserror::Error;

use parkbot_core::{BookingChangeKind, LeadSummary, LostItemAnswers};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("staff notification failed: {0}")]
    Delivery(String),
}

/// Pushes structured reports into the staff chat.
#[async_trait]
pub trait StaffNotifier: Send + Sync {
    /// A draft lead reached the hand-off bar (valid phone on file).
    async fn lead_ready(&self, summary: &LeadSummary) -> Result<(), NotifyError>;
    async fn escalation(&self, channel_key: &str, last_message: &str) -> Result<(), NotifyError>;
    async fn booking_change(
        &self,
        channel_key: &str,
        kind: BookingChangeKind,
        message: &str,
    ) -> Result<(), NotifyError>;
    async fn lost_item(
        &self,
        channel_key: &str,
        answers: &LostItemAnswers,
    ) -> Result<(), NotifyError>;
    async fn photo_request(
        &self,
        channel_key: &str,
        description: Option<&str>,
        phone: &str,
    ) -> Result<(), NotifyError>;
    async fn photo_order(&self, channel_key: &str, phone: &str) -> Result<(), NotifyError>;
    async fn partnership(
        &self,
        channel_key: &str,
        proposal: &str,
        phone: &str,
    ) -> Result<(), NotifyError>;
}

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("crm request failed: {0}")]
    Request(String),
    #[error("crm response was not usable: {0}")]
    Malformed(String),
}

/// Mirrors leads into the CRM pipeline.
#[async_trait]
pub trait CrmSync: Send + Sync {
    /// Creates or updates the deal for a lead. `None` means the sync is
    /// disabled for this deployment; the caller treats that as success.
    async fn upsert_deal(&self, summary: &LeadSummary) -> Result<Option<String>, CrmError>;
    /// Attaches a free-form note (conversation excerpt) to an existing deal.
    async fn attach_note(&self, deal_id: &str, note: &str) -> Result<(), CrmError>;
}

/// CRM seam for deployments that run without one.
pub struct NoopCrm;

#[async_trait]
impl CrmSync for NoopCrm {
    async fn upsert_deal(&self, _summary: &LeadSummary) -> Result<Option<String>, CrmError> {
        Ok(None)
    }

    async fn attach_note(&self, _deal_id: &str, _note: &str) -> Result<(), CrmError> {
        Ok(())
    }
}
