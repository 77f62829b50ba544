use crate::commands::{with_pool, CommandResult};

/// Rebuilds every client's lead counter from the leads table. The counter
/// is maintained incrementally at runtime; this repairs drift after manual
/// database edits.
pub fn run() -> CommandResult {
    with_pool("recount-leads", |pool| async move {
        let result = sqlx::query(
            "UPDATE clients SET total_leads =
                 (SELECT COUNT(*) FROM leads WHERE leads.client_id = clients.id)",
        )
        .execute(&pool)
        .await
        .map_err(|error| ("recount", error.to_string(), 5u8))?;

        Ok(format!("recounted leads for {} clients", result.rows_affected()))
    })
}
