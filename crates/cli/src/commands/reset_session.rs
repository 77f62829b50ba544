use crate::commands::{with_pool, CommandResult};
use parkbot_db::{SessionStore, SqlSessionStore};

/// Drops a conversation back to the neutral mode. Used when a visitor gets
/// stuck mid-wizard or staff want the bot to start over with someone.
pub fn run(channel_key: &str) -> CommandResult {
    let channel_key = channel_key.to_string();
    with_pool("reset-session", |pool| async move {
        let store = SqlSessionStore::new(pool);
        store
            .reset(&channel_key)
            .await
            .map_err(|error| ("session_reset", error.to_string(), 5u8))?;
        Ok(format!("session `{channel_key}` reset to neutral mode"))
    })
}
