use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use parkbot_core::domain::client::{Channel, ClientId};
use parkbot_core::domain::lead::{Lead, LeadId, LeadStatus};

use super::client::utc;
use super::{LeadStore, RepositoryError};
use crate::DbPool;

pub struct SqlLeadStore {
    pool: DbPool,
}

impl SqlLeadStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) const LEAD_COLUMNS: &str =
    "id, client_id, channel_key, source, park, customer_name, phone, child_name, child_age, \
     event_date, event_time, room, kids_count, adults_count, format, extras, status, \
     sent_to_staff, crm_deal_id, notes, created_at, updated_at";

pub(crate) fn map_lead(row: &SqliteRow) -> Result<Lead, RepositoryError> {
    let source: String = row.try_get("source")?;
    let status: String = row.try_get("status")?;
    let extras: String = row.try_get("extras")?;

    Ok(Lead {
        id: LeadId(row.try_get("id")?),
        client_id: row.try_get::<Option<i64>, _>("client_id")?.map(ClientId),
        channel_key: row.try_get("channel_key")?,
        source: Channel::parse(&source)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown lead source `{source}`")))?,
        park: row.try_get("park")?,
        customer_name: row.try_get("customer_name")?,
        phone: row.try_get("phone")?,
        child_name: row.try_get("child_name")?,
        child_age: row.try_get("child_age")?,
        event_date: row.try_get("event_date")?,
        event_time: row.try_get("event_time")?,
        room: row.try_get("room")?,
        kids_count: row.try_get("kids_count")?,
        adults_count: row.try_get("adults_count")?,
        format: row.try_get("format")?,
        extras: serde_json::from_str(&extras)
            .map_err(|err| RepositoryError::Decode(format!("lead extras: {err}")))?,
        status: LeadStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown lead status `{status}`")))?,
        sent_to_staff: row.try_get::<i64, _>("sent_to_staff")? != 0,
        crm_deal_id: row.try_get("crm_deal_id")?,
        notes: row.try_get("notes")?,
        created_at: utc(row.try_get("created_at")?),
        updated_at: utc(row.try_get("updated_at")?),
    })
}

#[async_trait]
impl LeadStore for SqlLeadStore {
    async fn find_by_id(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_lead).transpose()
    }

    async fn list_for_client(&self, client_id: ClientId) -> Result<Vec<Lead>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE client_id = ?1 ORDER BY id"
        ))
        .bind(client_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_lead).collect()
    }

    async fn list_active_drafts(&self, channel_key: &str) -> Result<Vec<Lead>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE channel_key = ?1 AND status IN ('new', 'contacted') AND sent_to_staff = 0
             ORDER BY updated_at DESC, id DESC"
        ))
        .bind(channel_key)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_lead).collect()
    }

    async fn set_status(&self, id: LeadId, status: LeadStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE leads SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
        )
        .bind(id.0)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "lead", id: id.0 });
        }
        Ok(())
    }

    async fn set_deal_id(&self, id: LeadId, deal_id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE leads SET crm_deal_id = ?2, updated_at = datetime('now') WHERE id = ?1",
        )
        .bind(id.0)
        .bind(deal_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "lead", id: id.0 });
        }
        Ok(())
    }

    async fn delete(&self, id: LeadId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM leads WHERE id = ?1").bind(id.0).execute(&self.pool).await?;
        Ok(())
    }
}
