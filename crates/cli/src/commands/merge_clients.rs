use crate::commands::{with_pool, CommandResult};
use parkbot_db::IdentityEngine;

/// Sweeps the store for clients that share a phone and merges each group
/// into its master record. Covers records that predate the automatic
/// merge-on-contact path.
pub fn run() -> CommandResult {
    with_pool("merge-clients", |pool| async move {
        let engine = IdentityEngine::new(pool);
        let merged = engine
            .sweep_duplicates_by_phone()
            .await
            .map_err(|error| ("merge", error.to_string(), 5u8))?;

        Ok(format!("merged {merged} duplicate client records"))
    })
}
