//! Draft lead lifecycle: one open draft per conversation, monotonic slot
//! merges, and the one-way handoff flag.

use sqlx::{Sqlite, Transaction};
use thiserror::Error;

use parkbot_core::domain::client::ClientId;
use parkbot_core::domain::lead::{ExtractedFields, Lead, LeadId, LeadStatus};
use parkbot_core::domain::phone::normalize_phone;
use parkbot_core::DomainError;

use crate::repositories::lead::{map_lead, LEAD_COLUMNS};
use crate::DbPool;

#[derive(Debug, Error)]
pub enum LeadError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("lead {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<crate::repositories::RepositoryError> for LeadError {
    fn from(value: crate::repositories::RepositoryError) -> Self {
        match value {
            crate::repositories::RepositoryError::Database(err) => Self::Database(err),
            crate::repositories::RepositoryError::Decode(msg) => Self::Decode(msg),
            crate::repositories::RepositoryError::NotFound { id, .. } => Self::NotFound(id),
        }
    }
}

/// Result of folding newly extracted fields into a draft.
pub struct MergeReport {
    pub lead: Lead,
    /// Slot names that actually changed this turn.
    pub changed: Vec<&'static str>,
}

pub struct LeadManager {
    pool: DbPool,
}

impl LeadManager {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Returns the open draft for a conversation, creating one when none
    /// exists. A conversation may only ever have one open draft; finding
    /// more than one is an integrity problem, logged and resolved by
    /// picking the most recently updated.
    pub async fn get_or_create_draft(
        &self,
        client_id: ClientId,
        channel_key: &str,
        source: &str,
        park: &str,
    ) -> Result<Lead, LeadError> {
        let mut tx = self.pool.begin().await?;

        let drafts = active_drafts(&mut tx, channel_key).await?;
        if drafts.len() > 1 {
            tracing::warn!(
                event_name = "draft_integrity",
                channel_key,
                count = drafts.len(),
                "multiple open drafts for one conversation; using the freshest"
            );
        }
        if let Some(draft) = drafts.into_iter().next() {
            tx.commit().await?;
            return Ok(draft);
        }

        let result = sqlx::query(
            "INSERT INTO leads (client_id, channel_key, source, park) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(client_id.0)
        .bind(channel_key)
        .bind(source)
        .bind(park)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        sqlx::query(
            "UPDATE clients SET total_leads = total_leads + 1, updated_at = datetime('now')
             WHERE id = ?1",
        )
        .bind(client_id.0)
        .execute(&mut *tx)
        .await?;

        let lead = load_lead(&mut tx, LeadId(id)).await?;
        tx.commit().await?;
        tracing::info!(event_name = "draft_created", lead_id = id, channel_key, "new draft lead");
        Ok(lead)
    }

    /// Merges extracted fields into a draft and persists the result. Empty
    /// extractions never erase stored slots; extras accumulate as a set.
    /// A valid phone also lands in the owning client's phone history.
    pub async fn merge_extracted(
        &self,
        id: LeadId,
        fields: &ExtractedFields,
    ) -> Result<MergeReport, LeadError> {
        let mut tx = self.pool.begin().await?;
        let mut lead = load_lead(&mut tx, id).await?;
        let changed = lead.apply_extracted(fields);

        if !changed.is_empty() {
            persist_slots(&mut tx, &lead).await?;
        }

        if let Some(client_id) = lead.client_id {
            if let Some(phone) = lead.phone.as_deref().and_then(normalize_phone) {
                record_client_phone(&mut tx, client_id, &phone).await?;
            }
            reconcile_child(&mut tx, client_id, &lead).await?;
        }

        tx.commit().await?;
        Ok(MergeReport { lead, changed })
    }

    /// Marks a lead as handed to staff. One-way: a lead already sent stays
    /// sent, and the call reports whether this invocation flipped the flag.
    pub async fn mark_sent(&self, id: LeadId) -> Result<bool, LeadError> {
        let result = sqlx::query(
            "UPDATE leads SET sent_to_staff = 1, updated_at = datetime('now')
             WHERE id = ?1 AND sent_to_staff = 0",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stores the CRM deal id once the lead exists remotely.
    pub async fn set_deal_id(&self, id: LeadId, deal_id: &str) -> Result<(), LeadError> {
        let result = sqlx::query(
            "UPDATE leads SET crm_deal_id = ?2, updated_at = datetime('now') WHERE id = ?1",
        )
        .bind(id.0)
        .bind(deal_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(LeadError::NotFound(id.0));
        }
        Ok(())
    }

    /// Applies a status change, enforcing the lifecycle rules.
    pub async fn set_status(&self, id: LeadId, status: LeadStatus) -> Result<Lead, LeadError> {
        let mut tx = self.pool.begin().await?;
        let mut lead = load_lead(&mut tx, id).await?;
        lead.transition_to(status)?;

        sqlx::query("UPDATE leads SET status = ?2, updated_at = datetime('now') WHERE id = ?1")
            .bind(id.0)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(lead)
    }

    /// Defers every open draft of a conversation. Used when a newer inquiry
    /// supersedes older unfinished ones; the data stays recoverable.
    pub async fn defer_open_drafts(&self, channel_key: &str) -> Result<u32, LeadError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM leads
             WHERE channel_key = ?1 AND status IN ('new', 'contacted') AND sent_to_staff = 0",
        )
        .bind(channel_key)
        .fetch_all(&self.pool)
        .await?;

        for id in &ids {
            self.set_status(LeadId(*id), LeadStatus::Deferred).await?;
        }
        let deferred = ids.len() as u32;
        if deferred > 0 {
            tracing::info!(
                event_name = "drafts_deferred",
                channel_key,
                count = deferred,
                "superseded open drafts deferred"
            );
        }
        Ok(deferred)
    }
}

async fn active_drafts(
    tx: &mut Transaction<'_, Sqlite>,
    channel_key: &str,
) -> Result<Vec<Lead>, LeadError> {
    let rows = sqlx::query(&format!(
        "SELECT {LEAD_COLUMNS} FROM leads
         WHERE channel_key = ?1 AND status IN ('new', 'contacted') AND sent_to_staff = 0
         ORDER BY updated_at DESC, id DESC"
    ))
    .bind(channel_key)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.iter().map(map_lead).collect::<Result<_, _>>()?)
}

async fn load_lead(tx: &mut Transaction<'_, Sqlite>, id: LeadId) -> Result<Lead, LeadError> {
    let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"))
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await?;
    match row {
        Some(row) => Ok(map_lead(&row)?),
        None => Err(LeadError::NotFound(id.0)),
    }
}

async fn persist_slots(tx: &mut Transaction<'_, Sqlite>, lead: &Lead) -> Result<(), LeadError> {
    let extras = serde_json::to_string(&lead.extras)
        .map_err(|err| LeadError::Decode(format!("lead extras: {err}")))?;
    sqlx::query(
        "UPDATE leads SET customer_name = ?2, phone = ?3, child_name = ?4, child_age = ?5,
                event_date = ?6, event_time = ?7, room = ?8, kids_count = ?9,
                adults_count = ?10, format = ?11, extras = ?12, notes = ?13,
                updated_at = datetime('now')
         WHERE id = ?1",
    )
    .bind(lead.id.0)
    .bind(&lead.customer_name)
    .bind(&lead.phone)
    .bind(&lead.child_name)
    .bind(lead.child_age)
    .bind(&lead.event_date)
    .bind(&lead.event_time)
    .bind(&lead.room)
    .bind(lead.kids_count)
    .bind(lead.adults_count)
    .bind(&lead.format)
    .bind(extras)
    .bind(&lead.notes)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn record_client_phone(
    tx: &mut Transaction<'_, Sqlite>,
    client_id: ClientId,
    phone: &str,
) -> Result<(), LeadError> {
    sqlx::query(
        "INSERT INTO client_phones (client_id, phone) VALUES (?1, ?2)
         ON CONFLICT (client_id, phone) DO UPDATE SET last_used_at = datetime('now')",
    )
    .bind(client_id.0)
    .bind(phone)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "UPDATE clients SET phone = ?2, updated_at = datetime('now')
         WHERE id = ?1 AND (phone IS NULL OR phone = '')",
    )
    .bind(client_id.0)
    .bind(phone)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Keeps the client's child roster in step with the draft. A child row is
/// keyed by (name, event date); a date-less row adopts the date when one
/// arrives, and a known age refines a missing one.
async fn reconcile_child(
    tx: &mut Transaction<'_, Sqlite>,
    client_id: ClientId,
    lead: &Lead,
) -> Result<(), LeadError> {
    let Some(name) = lead.child_name.as_deref() else {
        return Ok(());
    };

    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM client_children
         WHERE client_id = ?1 AND name = ?2
           AND (COALESCE(event_date, '') = COALESCE(?3, '') OR event_date IS NULL)
         ORDER BY event_date IS NULL, id
         LIMIT 1",
    )
    .bind(client_id.0)
    .bind(name)
    .bind(&lead.event_date)
    .fetch_optional(&mut **tx)
    .await?;

    match existing {
        Some(child_id) => {
            sqlx::query(
                "UPDATE client_children
                 SET event_date = COALESCE(event_date, ?2), age = COALESCE(age, ?3)
                 WHERE id = ?1",
            )
            .bind(child_id)
            .bind(&lead.event_date)
            .bind(lead.child_age)
            .execute(&mut **tx)
            .await?;
        }
        None => {
            sqlx::query(
                "INSERT INTO client_children (client_id, name, event_date, age)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(client_id.0)
            .bind(name)
            .bind(&lead.event_date)
            .bind(lead.child_age)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use parkbot_core::domain::client::{ChannelIdentity, ProfileHints};
    use parkbot_core::domain::lead::{ExtractedFields, LeadStatus};

    use super::LeadManager;
    use crate::identity::IdentityEngine;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        pool
    }

    async fn client(pool: &DbPool) -> parkbot_core::domain::client::Client {
        let engine = IdentityEngine::new(pool.clone());
        let (client, _) = engine
            .resolve(&ChannelIdentity::telegram("42"), None, &ProfileHints::default())
            .await
            .expect("client");
        client
    }

    #[tokio::test]
    async fn one_open_draft_per_conversation() {
        let db = pool().await;
        let client = client(&db).await;
        let manager = LeadManager::new(db.clone());

        let first = manager
            .get_or_create_draft(client.id, "tg_42", "telegram", "main")
            .await
            .expect("first");
        let second = manager
            .get_or_create_draft(client.id, "tg_42", "telegram", "main")
            .await
            .expect("second");
        assert_eq!(first.id, second.id);

        let count: i64 = sqlx::query_scalar("SELECT total_leads FROM clients WHERE id = ?1")
            .bind(client.id.0)
            .fetch_one(&db)
            .await
            .expect("count");
        assert_eq!(count, 1, "reusing the draft must not bump the lead counter");
    }

    #[tokio::test]
    async fn sent_draft_no_longer_blocks_a_new_one() {
        let db = pool().await;
        let client = client(&db).await;
        let manager = LeadManager::new(db.clone());

        let first = manager
            .get_or_create_draft(client.id, "tg_42", "telegram", "main")
            .await
            .expect("first");
        assert!(manager.mark_sent(first.id).await.expect("send"));
        assert!(!manager.mark_sent(first.id).await.expect("repeat send"), "mark_sent is one-way");

        let second = manager
            .get_or_create_draft(client.id, "tg_42", "telegram", "main")
            .await
            .expect("second");
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn merge_is_monotonic_across_turns() {
        let db = pool().await;
        let client = client(&db).await;
        let manager = LeadManager::new(db.clone());
        let draft = manager
            .get_or_create_draft(client.id, "tg_42", "telegram", "main")
            .await
            .expect("draft");

        let first = ExtractedFields {
            customer_name: Some("Anna".into()),
            kids_count: Some(10),
            extras: vec!["photographer".into()],
            ..Default::default()
        };
        let report = manager.merge_extracted(draft.id, &first).await.expect("merge");
        assert!(report.changed.contains(&"customer_name"));

        // A later sparse extraction must not erase anything.
        let second = ExtractedFields {
            event_date: Some("2026-09-12".into()),
            extras: vec!["photographer".into(), "cake".into()],
            ..Default::default()
        };
        let report = manager.merge_extracted(draft.id, &second).await.expect("merge");

        assert_eq!(report.lead.customer_name.as_deref(), Some("Anna"));
        assert_eq!(report.lead.kids_count, Some(10));
        assert_eq!(report.lead.event_date.as_deref(), Some("2026-09-12"));
        assert_eq!(report.lead.extras, vec!["photographer".to_string(), "cake".to_string()]);
    }

    #[tokio::test]
    async fn lead_phone_lands_in_client_history_once() {
        let db = pool().await;
        let client = client(&db).await;
        let manager = LeadManager::new(db.clone());
        let draft = manager
            .get_or_create_draft(client.id, "tg_42", "telegram", "main")
            .await
            .expect("draft");

        let fields = ExtractedFields {
            phone: Some("+7 (912) 345-67-89".into()),
            ..Default::default()
        };
        manager.merge_extracted(draft.id, &fields).await.expect("first merge");
        manager.merge_extracted(draft.id, &fields).await.expect("repeat merge");

        let history: Vec<String> =
            sqlx::query_scalar("SELECT phone FROM client_phones WHERE client_id = ?1")
                .bind(client.id.0)
                .fetch_all(&db)
                .await
                .expect("history");
        assert_eq!(history, vec!["9123456789".to_string()]);

        let primary: Option<String> =
            sqlx::query_scalar("SELECT phone FROM clients WHERE id = ?1")
                .bind(client.id.0)
                .fetch_one(&db)
                .await
                .expect("primary");
        assert_eq!(primary.as_deref(), Some("9123456789"));
    }

    #[tokio::test]
    async fn child_roster_tracks_draft_details() {
        let db = pool().await;
        let client = client(&db).await;
        let manager = LeadManager::new(db.clone());
        let draft = manager
            .get_or_create_draft(client.id, "tg_42", "telegram", "main")
            .await
            .expect("draft");

        manager
            .merge_extracted(
                draft.id,
                &ExtractedFields { child_name: Some("Masha".into()), ..Default::default() },
            )
            .await
            .expect("name only");
        manager
            .merge_extracted(
                draft.id,
                &ExtractedFields {
                    event_date: Some("2026-09-12".into()),
                    child_age: Some(7),
                    ..Default::default()
                },
            )
            .await
            .expect("date and age");

        let rows: Vec<(String, Option<String>, Option<i64>)> = sqlx::query_as(
            "SELECT name, event_date, age FROM client_children WHERE client_id = ?1",
        )
        .bind(client.id.0)
        .fetch_all(&db)
        .await
        .expect("children");
        assert_eq!(
            rows,
            vec![("Masha".to_string(), Some("2026-09-12".to_string()), Some(7))],
            "the date-less child row adopts the date instead of duplicating"
        );
    }

    #[tokio::test]
    async fn status_transitions_follow_the_lifecycle() {
        let db = pool().await;
        let client = client(&db).await;
        let manager = LeadManager::new(db.clone());
        let draft = manager
            .get_or_create_draft(client.id, "tg_42", "telegram", "main")
            .await
            .expect("draft");

        let booked = manager.set_status(draft.id, LeadStatus::Booked).await.expect("book");
        assert_eq!(booked.status, LeadStatus::Booked);

        let err = manager.set_status(draft.id, LeadStatus::Contacted).await;
        assert!(err.is_err(), "a booked lead cannot move back to contacted");
    }

    #[tokio::test]
    async fn superseded_drafts_are_deferred_not_lost() {
        let db = pool().await;
        let client = client(&db).await;
        let manager = LeadManager::new(db.clone());
        let draft = manager
            .get_or_create_draft(client.id, "tg_42", "telegram", "main")
            .await
            .expect("draft");

        let deferred = manager.defer_open_drafts("tg_42").await.expect("defer");
        assert_eq!(deferred, 1);

        let status: String = sqlx::query_scalar("SELECT status FROM leads WHERE id = ?1")
            .bind(draft.id.0)
            .fetch_one(&db)
            .await
            .expect("status");
        assert_eq!(status, "deferred");

        let fresh = manager
            .get_or_create_draft(client.id, "tg_42", "telegram", "main")
            .await
            .expect("fresh");
        assert_ne!(fresh.id, draft.id);
    }
}
