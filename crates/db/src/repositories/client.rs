use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use parkbot_core::domain::client::{
    Channel, Client, ClientChild, ClientId, ClientPhone, ProfileHints,
};

use super::{ClientStore, RepositoryError};
use crate::DbPool;

pub struct SqlClientStore {
    pool: DbPool,
}

impl SqlClientStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive, Utc)
}

pub(crate) fn map_client(row: &SqliteRow) -> Result<Client, RepositoryError> {
    Ok(Client {
        id: ClientId(row.try_get("id")?),
        telegram_id: row.try_get("telegram_id")?,
        vk_id: row.try_get("vk_id")?,
        username: row.try_get("username")?,
        display_name: row.try_get("display_name")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone: row.try_get("phone")?,
        total_leads: row.try_get("total_leads")?,
        created_at: utc(row.try_get("created_at")?),
        updated_at: utc(row.try_get("updated_at")?),
    })
}

fn map_phone(row: &SqliteRow) -> Result<ClientPhone, RepositoryError> {
    Ok(ClientPhone {
        id: row.try_get("id")?,
        client_id: ClientId(row.try_get("client_id")?),
        phone: row.try_get("phone")?,
        last_used_at: utc(row.try_get("last_used_at")?),
    })
}

fn map_child(row: &SqliteRow) -> Result<ClientChild, RepositoryError> {
    Ok(ClientChild {
        id: row.try_get("id")?,
        client_id: ClientId(row.try_get("client_id")?),
        name: row.try_get("name")?,
        event_date: row.try_get("event_date")?,
        age: row.try_get("age")?,
    })
}

pub(crate) fn channel_column(channel: Channel) -> &'static str {
    match channel {
        Channel::Telegram => "telegram_id",
        Channel::Vk => "vk_id",
    }
}

const CLIENT_COLUMNS: &str = "id, telegram_id, vk_id, username, display_name, first_name, \
                              last_name, phone, total_leads, created_at, updated_at";

#[async_trait]
impl ClientStore for SqlClientStore {
    async fn find_by_id(&self, id: ClientId) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_client).transpose()
    }

    async fn find_by_channel(
        &self,
        channel: Channel,
        channel_user_id: &str,
    ) -> Result<Option<Client>, RepositoryError> {
        let column = channel_column(channel);
        let row =
            sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE {column} = ?1"))
                .bind(channel_user_id)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(map_client).transpose()
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Client>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT DISTINCT c.{} FROM clients c
             LEFT JOIN client_phones p ON p.client_id = c.id
             WHERE c.phone = ?1 OR p.phone = ?1
             ORDER BY c.id",
            CLIENT_COLUMNS.replace(", ", ", c.")
        ))
        .bind(phone)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_client).collect()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Client>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY id LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_client).collect()
    }

    async fn update(&self, client: &Client) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE clients SET telegram_id = ?2, vk_id = ?3, username = ?4, display_name = ?5,
                    first_name = ?6, last_name = ?7, phone = ?8,
                    updated_at = datetime('now')
             WHERE id = ?1",
        )
        .bind(client.id.0)
        .bind(&client.telegram_id)
        .bind(&client.vk_id)
        .bind(&client.username)
        .bind(&client.display_name)
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.phone)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "client", id: client.id.0 });
        }
        Ok(())
    }

    async fn delete(&self, id: ClientId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM clients WHERE id = ?1").bind(id.0).execute(&self.pool).await?;
        Ok(())
    }

    async fn fill_profile(
        &self,
        id: ClientId,
        hints: &ProfileHints,
    ) -> Result<(), RepositoryError> {
        if hints.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "UPDATE clients SET username = COALESCE(username, ?2),
                    display_name = COALESCE(display_name, ?3),
                    first_name = COALESCE(first_name, ?4),
                    last_name = COALESCE(last_name, ?5),
                    updated_at = datetime('now')
             WHERE id = ?1",
        )
        .bind(id.0)
        .bind(&hints.username)
        .bind(&hints.display_name)
        .bind(&hints.first_name)
        .bind(&hints.last_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_phone(&self, id: ClientId, phone: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO client_phones (client_id, phone) VALUES (?1, ?2)
             ON CONFLICT (client_id, phone) DO UPDATE SET last_used_at = datetime('now')",
        )
        .bind(id.0)
        .bind(phone)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn phones(&self, id: ClientId) -> Result<Vec<ClientPhone>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, client_id, phone, last_used_at FROM client_phones
             WHERE client_id = ?1 ORDER BY last_used_at DESC, id DESC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_phone).collect()
    }

    async fn children(&self, id: ClientId) -> Result<Vec<ClientChild>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, client_id, name, event_date, age FROM client_children
             WHERE client_id = ?1 ORDER BY id",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_child).collect()
    }
}
