//! Identity resolution and client de-duplication.
//!
//! `resolve` finds or creates the canonical client for a channel identity,
//! backfilling identifiers when a phone number reveals that two separate
//! channel conversations belong to the same person. `merge` folds a
//! duplicate client into a master inside a single transaction so a crash
//! mid-merge can never leave leads pointing at a deleted client.

use sqlx::{Sqlite, Transaction};
use thiserror::Error;

use parkbot_core::domain::client::{choose_master, ChannelIdentity, Client, ClientId, ProfileHints};
use parkbot_core::domain::phone::normalize_phone;

use crate::repositories::client::{channel_column, map_client};
use crate::DbPool;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("client {0} not found")]
    NotFound(i64),
}

impl From<crate::repositories::RepositoryError> for IdentityError {
    fn from(value: crate::repositories::RepositoryError) -> Self {
        match value {
            crate::repositories::RepositoryError::Database(err) => Self::Database(err),
            crate::repositories::RepositoryError::Decode(msg) => Self::Decode(msg),
            crate::repositories::RepositoryError::NotFound { id, .. } => Self::NotFound(id),
        }
    }
}

/// How `resolve` arrived at the returned client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Exact match on the calling channel's identifier.
    ChannelMatch,
    /// Matched by phone; the calling channel's identifier was backfilled.
    PhoneBackfill,
    /// No match anywhere; a fresh client was created.
    Created,
    /// The phone revealed a duplicate which was folded into the master.
    Merged,
    /// The phone spans clients that both hold an identifier of the calling
    /// channel's type. Both records are kept; nothing is merged.
    AmbiguousKeptBoth,
}

pub struct IdentityEngine {
    pool: DbPool,
}

const CLIENT_COLUMNS: &str = "id, telegram_id, vk_id, username, display_name, first_name, \
                              last_name, phone, total_leads, created_at, updated_at";

impl IdentityEngine {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Finds or creates the canonical client for a channel identity.
    ///
    /// Lookup order: the channel identifier field first, then the
    /// normalized phone across history and current-phone fields. Profile
    /// hints only ever fill empty fields.
    pub async fn resolve(
        &self,
        identity: &ChannelIdentity,
        raw_phone: Option<&str>,
        hints: &ProfileHints,
    ) -> Result<(Client, Resolution), IdentityError> {
        let phone = raw_phone.and_then(normalize_phone);
        let mut tx = self.pool.begin().await?;

        let outcome = match find_by_channel(&mut tx, identity).await? {
            Some(client) => {
                self.resolve_known(&mut tx, client, identity, phone.as_deref(), hints).await?
            }
            None => self.resolve_unknown(&mut tx, identity, phone.as_deref(), hints).await?,
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn resolve_known(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        client: Client,
        identity: &ChannelIdentity,
        phone: Option<&str>,
        hints: &ProfileHints,
    ) -> Result<(Client, Resolution), IdentityError> {
        fill_profile(tx, client.id, hints).await?;

        let mut surviving_id = client.id;
        let mut resolution = Resolution::ChannelMatch;

        if let Some(phone) = phone {
            record_phone(tx, client.id, phone).await?;
            adopt_primary_phone(tx, client.id, phone).await?;

            // A known phone showing up under another client means the same
            // person reached us twice. Fold the records together unless the
            // other record also holds an identifier of this channel's type.
            for other in find_by_phone(tx, phone).await? {
                if other.id == surviving_id {
                    continue;
                }
                if other.channel_id(identity.channel).is_some() {
                    tracing::warn!(
                        event_name = "identity_ambiguous",
                        channel = identity.channel.as_str(),
                        client_id = surviving_id.0,
                        other_id = other.id.0,
                        phone,
                        "phone spans two clients with same-channel identifiers; keeping both"
                    );
                    resolution = Resolution::AmbiguousKeptBoth;
                    continue;
                }
                let current = load_client(tx, surviving_id).await?;
                surviving_id = merge_within(tx, current, other).await?;
                resolution = Resolution::Merged;
            }
        }

        let client = load_client(tx, surviving_id).await?;
        Ok((client, resolution))
    }

    async fn resolve_unknown(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        identity: &ChannelIdentity,
        phone: Option<&str>,
        hints: &ProfileHints,
    ) -> Result<(Client, Resolution), IdentityError> {
        if let Some(phone) = phone {
            let matches = find_by_phone(tx, phone).await?;
            let backfill_target =
                matches.iter().find(|c| c.channel_id(identity.channel).is_none()).cloned();

            if let Some(target) = backfill_target {
                set_channel_id(tx, target.id, identity).await?;
                fill_profile(tx, target.id, hints).await?;
                record_phone(tx, target.id, phone).await?;
                adopt_primary_phone(tx, target.id, phone).await?;
                let client = load_client(tx, target.id).await?;
                tracing::info!(
                    event_name = "identity_backfill",
                    channel = identity.channel.as_str(),
                    client_id = client.id.0,
                    "attached channel identifier to phone-matched client"
                );
                return Ok((client, Resolution::PhoneBackfill));
            }

            if !matches.is_empty() {
                // Every phone match already carries a different identifier of
                // this channel's type. Guessing would destroy data, so a new
                // record is created alongside them.
                let client = create_client(tx, identity, Some(phone), hints).await?;
                tracing::warn!(
                    event_name = "identity_ambiguous",
                    channel = identity.channel.as_str(),
                    client_id = client.id.0,
                    phone,
                    "phone already belongs to same-channel clients; created a separate record"
                );
                return Ok((client, Resolution::AmbiguousKeptBoth));
            }
        }

        let client = create_client(tx, identity, phone, hints).await?;
        Ok((client, Resolution::Created))
    }

    /// Folds `duplicate` into `master` (direction decided by the master
    /// priority rule) in one transaction. Idempotent: a repeated call with
    /// an already-merged pair is a no-op returning the survivor.
    pub async fn merge(
        &self,
        a: ClientId,
        b: ClientId,
    ) -> Result<Client, IdentityError> {
        let mut tx = self.pool.begin().await?;

        let first = try_load_client(&mut tx, a).await?;
        let second = try_load_client(&mut tx, b).await?;

        let surviving_id = match (first, second) {
            (Some(first), Some(second)) if first.id != second.id => {
                merge_within(&mut tx, first, second).await?
            }
            (Some(only), None) | (None, Some(only)) => only.id,
            (Some(same), Some(_)) => same.id,
            (None, None) => return Err(IdentityError::NotFound(a.0)),
        };

        let client = load_client(&mut tx, surviving_id).await?;
        tx.commit().await?;
        Ok(client)
    }

    /// Operational sweep: merges every pair of clients that share a
    /// normalized phone. Returns the number of merges performed.
    pub async fn sweep_duplicates_by_phone(&self) -> Result<u32, IdentityError> {
        let phones: Vec<String> = sqlx::query_scalar(
            "SELECT phone FROM (
                 SELECT DISTINCT client_id, phone FROM (
                     SELECT client_id, phone FROM client_phones
                     UNION
                     SELECT id AS client_id, phone FROM clients WHERE phone IS NOT NULL
                 )
             )
             GROUP BY phone HAVING COUNT(*) > 1",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut merges = 0;
        for phone in phones {
            loop {
                let mut tx = self.pool.begin().await?;
                let matches = find_by_phone(&mut tx, &phone).await?;
                let Some((first, rest)) = matches.split_first() else {
                    break;
                };
                let Some(second) = rest.first() else {
                    break;
                };
                merge_within(&mut tx, first.clone(), second.clone()).await?;
                tx.commit().await?;
                merges += 1;
            }
            tracing::info!(event_name = "identity_sweep_phone", phone, "deduplicated phone");
        }
        Ok(merges)
    }
}

async fn find_by_channel(
    tx: &mut Transaction<'_, Sqlite>,
    identity: &ChannelIdentity,
) -> Result<Option<Client>, IdentityError> {
    let column = channel_column(identity.channel);
    let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE {column} = ?1"))
        .bind(&identity.user_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.as_ref().map(map_client).transpose()?)
}

async fn find_by_phone(
    tx: &mut Transaction<'_, Sqlite>,
    phone: &str,
) -> Result<Vec<Client>, IdentityError> {
    let rows = sqlx::query(&format!(
        "SELECT DISTINCT c.{} FROM clients c
         LEFT JOIN client_phones p ON p.client_id = c.id
         WHERE c.phone = ?1 OR p.phone = ?1
         ORDER BY c.id",
        CLIENT_COLUMNS.replace(", ", ", c.")
    ))
    .bind(phone)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.iter().map(map_client).collect::<Result<_, _>>()?)
}

async fn try_load_client(
    tx: &mut Transaction<'_, Sqlite>,
    id: ClientId,
) -> Result<Option<Client>, IdentityError> {
    let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"))
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.as_ref().map(map_client).transpose()?)
}

async fn load_client(
    tx: &mut Transaction<'_, Sqlite>,
    id: ClientId,
) -> Result<Client, IdentityError> {
    try_load_client(tx, id).await?.ok_or(IdentityError::NotFound(id.0))
}

async fn create_client(
    tx: &mut Transaction<'_, Sqlite>,
    identity: &ChannelIdentity,
    phone: Option<&str>,
    hints: &ProfileHints,
) -> Result<Client, IdentityError> {
    let column = channel_column(identity.channel);
    let result = sqlx::query(&format!(
        "INSERT INTO clients ({column}, username, display_name, first_name, last_name, phone)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
    ))
    .bind(&identity.user_id)
    .bind(&hints.username)
    .bind(&hints.display_name)
    .bind(&hints.first_name)
    .bind(&hints.last_name)
    .bind(phone)
    .execute(&mut **tx)
    .await?;

    let id = ClientId(result.last_insert_rowid());
    if let Some(phone) = phone {
        record_phone(tx, id, phone).await?;
    }
    load_client(tx, id).await
}

async fn set_channel_id(
    tx: &mut Transaction<'_, Sqlite>,
    id: ClientId,
    identity: &ChannelIdentity,
) -> Result<(), IdentityError> {
    let column = channel_column(identity.channel);
    sqlx::query(&format!(
        "UPDATE clients SET {column} = ?2, updated_at = datetime('now') WHERE id = ?1"
    ))
    .bind(id.0)
    .bind(&identity.user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn fill_profile(
    tx: &mut Transaction<'_, Sqlite>,
    id: ClientId,
    hints: &ProfileHints,
) -> Result<(), IdentityError> {
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
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn record_phone(
    tx: &mut Transaction<'_, Sqlite>,
    id: ClientId,
    phone: &str,
) -> Result<(), IdentityError> {
    sqlx::query(
        "INSERT INTO client_phones (client_id, phone) VALUES (?1, ?2)
         ON CONFLICT (client_id, phone) DO UPDATE SET last_used_at = datetime('now')",
    )
    .bind(id.0)
    .bind(phone)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn adopt_primary_phone(
    tx: &mut Transaction<'_, Sqlite>,
    id: ClientId,
    phone: &str,
) -> Result<(), IdentityError> {
    sqlx::query(
        "UPDATE clients SET phone = ?2, updated_at = datetime('now')
         WHERE id = ?1 AND (phone IS NULL OR phone = '')",
    )
    .bind(id.0)
    .bind(phone)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// The merge itself. Assumes both clients are loaded within the caller's
/// transaction and are distinct. Returns the surviving client id.
async fn merge_within(
    tx: &mut Transaction<'_, Sqlite>,
    a: Client,
    b: Client,
) -> Result<ClientId, IdentityError> {
    let (master, duplicate) = choose_master(a, b);
    let master_id = master.id;
    let duplicate_id = duplicate.id;

    // Children the master already has (same name + event date) would become
    // duplicates after re-pointing; drop them from the losing side first.
    sqlx::query(
        "DELETE FROM client_children
         WHERE client_id = ?1 AND EXISTS (
             SELECT 1 FROM client_children m
             WHERE m.client_id = ?2
               AND m.name = client_children.name
               AND COALESCE(m.event_date, '') = COALESCE(client_children.event_date, '')
         )",
    )
    .bind(duplicate_id.0)
    .bind(master_id.0)
    .execute(&mut **tx)
    .await?;

    sqlx::query("UPDATE client_children SET client_id = ?2 WHERE client_id = ?1")
        .bind(duplicate_id.0)
        .bind(master_id.0)
        .execute(&mut **tx)
        .await?;

    // Phone history folds by (client, phone); the fresher last-used stamp
    // wins on conflict.
    sqlx::query(
        "INSERT INTO client_phones (client_id, phone, last_used_at)
         SELECT ?2, phone, last_used_at FROM client_phones WHERE client_id = ?1
         ON CONFLICT (client_id, phone) DO UPDATE
         SET last_used_at = MAX(client_phones.last_used_at, excluded.last_used_at)",
    )
    .bind(duplicate_id.0)
    .bind(master_id.0)
    .execute(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM client_phones WHERE client_id = ?1")
        .bind(duplicate_id.0)
        .execute(&mut **tx)
        .await?;

    sqlx::query("UPDATE leads SET client_id = ?2 WHERE client_id = ?1")
        .bind(duplicate_id.0)
        .bind(master_id.0)
        .execute(&mut **tx)
        .await?;

    // Delete the duplicate before copying its identifiers across, so the
    // UNIQUE channel-id constraints cannot trip mid-merge.
    sqlx::query("DELETE FROM clients WHERE id = ?1")
        .bind(duplicate_id.0)
        .execute(&mut **tx)
        .await?;

    sqlx::query(
        "UPDATE clients SET telegram_id = COALESCE(telegram_id, ?2),
                vk_id = COALESCE(vk_id, ?3),
                username = COALESCE(username, ?4),
                display_name = COALESCE(display_name, ?5),
                first_name = COALESCE(first_name, ?6),
                last_name = COALESCE(last_name, ?7),
                phone = COALESCE(phone, ?8),
                total_leads = (SELECT COUNT(*) FROM leads WHERE client_id = ?1),
                updated_at = datetime('now')
         WHERE id = ?1",
    )
    .bind(master_id.0)
    .bind(&duplicate.telegram_id)
    .bind(&duplicate.vk_id)
    .bind(&duplicate.username)
    .bind(&duplicate.display_name)
    .bind(&duplicate.first_name)
    .bind(&duplicate.last_name)
    .bind(&duplicate.phone)
    .execute(&mut **tx)
    .await?;

    tracing::info!(
        event_name = "identity_merged",
        master_id = master_id.0,
        duplicate_id = duplicate_id.0,
        "merged duplicate client into master"
    );

    Ok(master_id)
}

#[cfg(test)]
mod tests {
    use parkbot_core::domain::client::{ChannelIdentity, ClientId, ProfileHints};

    use super::{IdentityEngine, Resolution};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        pool
    }

    fn hints(first: &str) -> ProfileHints {
        ProfileHints { first_name: Some(first.to_string()), ..Default::default() }
    }

    async fn insert_lead(pool: &DbPool, client_id: i64, channel_key: &str) {
        sqlx::query(
            "INSERT INTO leads (client_id, channel_key, source) VALUES (?1, ?2, 'telegram')",
        )
        .bind(client_id)
        .bind(channel_key)
        .execute(pool)
        .await
        .expect("insert lead");
        sqlx::query("UPDATE clients SET total_leads = total_leads + 1 WHERE id = ?1")
            .bind(client_id)
            .execute(pool)
            .await
            .expect("bump count");
    }

    async fn insert_child(pool: &DbPool, client_id: i64, name: &str, date: Option<&str>) {
        sqlx::query("INSERT INTO client_children (client_id, name, event_date) VALUES (?1, ?2, ?3)")
            .bind(client_id)
            .bind(name)
            .bind(date)
            .execute(pool)
            .await
            .expect("insert child");
    }

    #[tokio::test]
    async fn first_contact_creates_a_client_with_hints() {
        let engine = IdentityEngine::new(pool().await);
        let (client, resolution) = engine
            .resolve(&ChannelIdentity::telegram("42"), Some("+7 912 345-67-89"), &hints("Anna"))
            .await
            .expect("resolve");

        assert_eq!(resolution, Resolution::Created);
        assert_eq!(client.telegram_id.as_deref(), Some("42"));
        assert_eq!(client.first_name.as_deref(), Some("Anna"));
        assert_eq!(client.phone.as_deref(), Some("9123456789"));
    }

    #[tokio::test]
    async fn repeat_contact_matches_by_channel_and_keeps_profile() {
        let engine = IdentityEngine::new(pool().await);
        let (first, _) = engine
            .resolve(&ChannelIdentity::telegram("42"), None, &hints("Anna"))
            .await
            .expect("first");

        let (second, resolution) = engine
            .resolve(&ChannelIdentity::telegram("42"), None, &hints("Annie"))
            .await
            .expect("second");

        assert_eq!(resolution, Resolution::ChannelMatch);
        assert_eq!(second.id, first.id);
        // Hints never overwrite stored values.
        assert_eq!(second.first_name.as_deref(), Some("Anna"));
    }

    #[tokio::test]
    async fn phone_match_backfills_the_other_channel_identifier() {
        let engine = IdentityEngine::new(pool().await);
        let (tg, _) = engine
            .resolve(&ChannelIdentity::telegram("42"), Some("9123456789"), &hints("Anna"))
            .await
            .expect("telegram");

        let (vk, resolution) = engine
            .resolve(&ChannelIdentity::vk("777"), Some("9123456789"), &ProfileHints::default())
            .await
            .expect("vk");

        assert_eq!(resolution, Resolution::PhoneBackfill);
        assert_eq!(vk.id, tg.id);
        assert_eq!(vk.telegram_id.as_deref(), Some("42"));
        assert_eq!(vk.vk_id.as_deref(), Some("777"));
    }

    #[tokio::test]
    async fn shared_phone_merges_two_distinct_clients_with_combined_counts() {
        let db = pool().await;
        let engine = IdentityEngine::new(db.clone());

        // Two separate conversations that never shared a phone yet.
        let (tg, _) = engine
            .resolve(&ChannelIdentity::telegram("42"), None, &hints("Anna"))
            .await
            .expect("telegram");
        let (vk, _) = engine
            .resolve(&ChannelIdentity::vk("777"), Some("9123456789"), &ProfileHints::default())
            .await
            .expect("vk");
        assert_ne!(tg.id, vk.id);

        insert_lead(&db, tg.id.0, "tg_42").await;
        insert_lead(&db, tg.id.0, "tg_42").await;
        insert_lead(&db, vk.id.0, "vk_777").await;
        insert_child(&db, vk.id.0, "Masha", Some("2026-09-12")).await;

        // The telegram side now supplies the same phone.
        let (merged, resolution) = engine
            .resolve(&ChannelIdentity::telegram("42"), Some("9123456789"), &ProfileHints::default())
            .await
            .expect("merge");

        assert_eq!(resolution, Resolution::Merged);
        assert_eq!(merged.telegram_id.as_deref(), Some("42"));
        assert_eq!(merged.vk_id.as_deref(), Some("777"));
        assert_eq!(merged.total_leads, 3);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients")
            .fetch_one(&db)
            .await
            .expect("count");
        assert_eq!(remaining, 1);

        let owned_leads: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE client_id = ?1")
                .bind(merged.id.0)
                .fetch_one(&db)
                .await
                .expect("leads");
        assert_eq!(owned_leads, 3);

        let owned_children: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM client_children WHERE client_id = ?1")
                .bind(merged.id.0)
                .fetch_one(&db)
                .await
                .expect("children");
        assert_eq!(owned_children, 1);
    }

    #[tokio::test]
    async fn merge_is_idempotent_and_deduplicates_history() {
        let db = pool().await;
        let engine = IdentityEngine::new(db.clone());

        let (a, _) = engine
            .resolve(&ChannelIdentity::telegram("1"), Some("9123456789"), &hints("Anna"))
            .await
            .expect("a");
        let (b, _) = engine
            .resolve(&ChannelIdentity::vk("2"), Some("9990001122"), &ProfileHints::default())
            .await
            .expect("b");
        insert_child(&db, a.id.0, "Masha", None).await;
        insert_child(&db, b.id.0, "Masha", None).await;

        let merged = engine.merge(a.id, b.id).await.expect("merge");
        let again = engine.merge(a.id, b.id).await.expect("repeat merge");
        assert_eq!(merged.id, again.id);

        let phones: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM client_phones WHERE client_id = ?1")
                .bind(merged.id.0)
                .fetch_one(&db)
                .await
                .expect("phones");
        assert_eq!(phones, 2);

        let children: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM client_children WHERE client_id = ?1")
                .bind(merged.id.0)
                .fetch_one(&db)
                .await
                .expect("children");
        assert_eq!(children, 1, "same-name children must not duplicate across a merge");
    }

    #[tokio::test]
    async fn ambiguous_same_channel_identifiers_keep_both_records() {
        let db = pool().await;
        let engine = IdentityEngine::new(db.clone());

        let (first, _) = engine
            .resolve(&ChannelIdentity::telegram("1"), Some("9123456789"), &hints("Anna"))
            .await
            .expect("first");
        // A different telegram account claims the same phone.
        let (second, resolution) = engine
            .resolve(&ChannelIdentity::telegram("2"), Some("9123456789"), &hints("Boris"))
            .await
            .expect("second");

        assert_eq!(resolution, Resolution::AmbiguousKeptBoth);
        assert_ne!(first.id, second.id);

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM clients").fetch_one(&db).await.expect("count");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn sweep_merges_every_phone_duplicate() {
        let db = pool().await;
        let engine = IdentityEngine::new(db.clone());

        let (a, _) = engine
            .resolve(&ChannelIdentity::telegram("1"), Some("9123456789"), &ProfileHints::default())
            .await
            .expect("a");
        let (b, _) = engine
            .resolve(&ChannelIdentity::vk("2"), None, &ProfileHints::default())
            .await
            .expect("b");
        // Same phone observed later on the vk-only record.
        sqlx::query("INSERT INTO client_phones (client_id, phone) VALUES (?1, '9123456789')")
            .bind(b.id.0)
            .execute(&db)
            .await
            .expect("phone");

        let merges = engine.sweep_duplicates_by_phone().await.expect("sweep");
        assert_eq!(merges, 1);

        let survivor = engine.merge(a.id, ClientId(b.id.0)).await.expect("load survivor");
        assert_eq!(survivor.telegram_id.as_deref(), Some("1"));
        assert_eq!(survivor.vk_id.as_deref(), Some("2"));
    }
}
