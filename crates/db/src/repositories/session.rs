use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use parkbot_core::domain::session::{DialogueMode, DialogueTurn, Session, SessionId, TurnRole};

use super::client::utc;
use super::{RepositoryError, SessionStore};
use crate::DbPool;

pub struct SqlSessionStore {
    pool: DbPool,
}

impl SqlSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SESSION_COLUMNS: &str =
    "id, channel_key, username, park, mode, scratch, created_at, updated_at";

fn map_session(row: &SqliteRow) -> Result<Session, RepositoryError> {
    let mode: String = row.try_get("mode")?;
    let scratch: String = row.try_get("scratch")?;

    Ok(Session {
        id: SessionId(row.try_get("id")?),
        channel_key: row.try_get("channel_key")?,
        username: row.try_get("username")?,
        park: row.try_get("park")?,
        mode: DialogueMode::from_storage(&mode, &scratch),
        created_at: utc(row.try_get("created_at")?),
        updated_at: utc(row.try_get("updated_at")?),
    })
}

fn map_turn(row: &SqliteRow) -> Result<DialogueTurn, RepositoryError> {
    let role: String = row.try_get("role")?;
    Ok(DialogueTurn {
        role: TurnRole::parse(&role)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown turn role `{role}`")))?,
        content: row.try_get("content")?,
        created_at: utc(row.try_get("created_at")?),
    })
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    async fn get_or_create(
        &self,
        channel_key: &str,
        username: Option<&str>,
        park: &str,
    ) -> Result<Session, RepositoryError> {
        sqlx::query(
            "INSERT INTO sessions (channel_key, username, park) VALUES (?1, ?2, ?3)
             ON CONFLICT (channel_key) DO UPDATE
             SET username = COALESCE(excluded.username, sessions.username),
                 updated_at = datetime('now')",
        )
        .bind(channel_key)
        .bind(username)
        .bind(park)
        .execute(&self.pool)
        .await?;

        let row =
            sqlx::query(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE channel_key = ?1"))
                .bind(channel_key)
                .fetch_one(&self.pool)
                .await?;
        map_session(&row)
    }

    async fn save_mode(
        &self,
        channel_key: &str,
        mode: &DialogueMode,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE sessions SET mode = ?2, scratch = ?3, updated_at = datetime('now')
             WHERE channel_key = ?1",
        )
        .bind(channel_key)
        .bind(mode.storage_mode())
        .bind(mode.storage_scratch())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "session", id: 0 });
        }
        Ok(())
    }

    async fn reset(&self, channel_key: &str) -> Result<(), RepositoryError> {
        self.save_mode(channel_key, &DialogueMode::Unknown).await
    }

    async fn append_turn(
        &self,
        session_id: i64,
        role: TurnRole,
        content: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO messages (session_id, role, content) VALUES (?1, ?2, ?3)")
            .bind(session_id)
            .bind(role.as_str())
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent_turns(
        &self,
        session_id: i64,
        limit: u32,
    ) -> Result<Vec<DialogueTurn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT role, content, created_at FROM
               (SELECT id, role, content, created_at FROM messages
                WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2)
             ORDER BY id ASC",
        )
        .bind(session_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_turn).collect()
    }
}

#[cfg(test)]
mod tests {
    use parkbot_core::domain::session::{
        DialogueMode, LostItemState, LostItemStep, TurnRole,
    };

    use super::{SessionStore, SqlSessionStore};
    use crate::{connect_with_settings, migrations};

    async fn store() -> SqlSessionStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlSessionStore::new(pool)
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_channel_key() {
        let store = store().await;
        let first = store.get_or_create("tg_1", Some("anna"), "main").await.expect("create");
        let second = store.get_or_create("tg_1", None, "main").await.expect("reuse");

        assert_eq!(first.id, second.id);
        assert_eq!(second.username.as_deref(), Some("anna"));
        assert_eq!(second.mode, DialogueMode::Unknown);
    }

    #[tokio::test]
    async fn wizard_mode_round_trips_and_reset_clears_it() {
        let store = store().await;
        store.get_or_create("tg_2", None, "main").await.expect("create");

        let wizard = DialogueMode::LostItem(LostItemState {
            step: LostItemStep::Description,
            answers: Default::default(),
        });
        store.save_mode("tg_2", &wizard).await.expect("save");
        let loaded = store.get_or_create("tg_2", None, "main").await.expect("load");
        assert_eq!(loaded.mode, wizard);

        store.reset("tg_2").await.expect("reset");
        let after = store.get_or_create("tg_2", None, "main").await.expect("load");
        assert_eq!(after.mode, DialogueMode::Unknown);
    }

    #[tokio::test]
    async fn recent_turns_returns_the_tail_in_order() {
        let store = store().await;
        let session = store.get_or_create("tg_3", None, "main").await.expect("create");

        for i in 0..5 {
            store
                .append_turn(session.id.0, TurnRole::User, &format!("message {i}"))
                .await
                .expect("append");
        }

        let turns = store.recent_turns(session.id.0, 3).await.expect("turns");
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
    }
}
