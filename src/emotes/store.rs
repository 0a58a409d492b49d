//! Emote storage (SQLite) and the lookup interface the extractor consumes.

use crate::db::{from_db_id, to_db_id};
use crate::emotes::Emote;
use crate::error::Result;
use crate::{EmoteId, GuildId, UserId};

use anyhow::Context as _;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row as _, SqlitePool};
use std::future::Future;

/// What the reply engine needs from emote storage.
///
/// `get_emote` returning `Ok(None)` is an ordinary miss, not an error. The
/// gating methods default to "respond to everyone" so lightweight stores only
/// implement lookup and usage.
pub trait EmoteStore: Send + Sync + 'static {
    /// Find an emote by name, case-insensitively.
    fn get_emote(&self, name: &str) -> impl Future<Output = Result<Option<Emote>>> + Send;

    /// Record that `user_id` used `emote_id` once.
    fn log_emote_use(
        &self,
        emote_id: EmoteId,
        user_id: UserId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Whether `user_id` should get auto-responses in `guild_id`.
    fn auto_response_enabled(
        &self,
        _guild_id: Option<GuildId>,
        _user_id: UserId,
    ) -> impl Future<Output = Result<bool>> + Send {
        async { Ok(true) }
    }

    /// Why `user_id` is blacklisted, if they are.
    fn blacklist_reason(
        &self,
        _user_id: UserId,
    ) -> impl Future<Output = Result<Option<String>>> + Send {
        async { Ok(None) }
    }
}

/// Input for [`SqliteEmoteStore::create_emote`].
#[derive(Debug, Clone)]
pub struct NewEmote {
    pub id: EmoteId,
    pub name: String,
    pub animated: bool,
    pub author_id: UserId,
    pub description: Option<String>,
}

/// SQLite-backed emote store.
#[derive(Debug, Clone)]
pub struct SqliteEmoteStore {
    pool: SqlitePool,
}

impl SqliteEmoteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an emote record. Name and image validation happen upstream.
    pub async fn create_emote(&self, input: NewEmote) -> Result<Emote> {
        sqlx::query(
            r#"
            INSERT INTO emotes (id, name, author_id, animated, description)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(to_db_id(input.id))
        .bind(&input.name)
        .bind(to_db_id(input.author_id))
        .bind(input.animated)
        .bind(&input.description)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to create emote {}", input.name))?;

        let emote = self
            .fetch_emote(&input.name)
            .await?
            .with_context(|| format!("emote {} missing right after insert", input.name))?;

        tracing::info!(emote_id = emote.id, name = %emote.name, "emote created");
        Ok(emote)
    }

    async fn fetch_emote(&self, name: &str) -> Result<Option<Emote>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, author_id, animated, description, created_at
            FROM emotes
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up emote")?;

        row.as_ref()
            .map(emote_from_row)
            .transpose()
            .context("failed to decode emote row")
            .map_err(Into::into)
    }

    /// Number of recorded uses of an emote.
    pub async fn emote_usage(&self, emote_id: EmoteId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM emote_usage_history WHERE emote_id = ?")
                .bind(to_db_id(emote_id))
                .fetch_one(&self.pool)
                .await
                .context("failed to count emote usage")?;

        Ok(count)
    }

    /// Flip the user's auto-response state and return the new one.
    ///
    /// The choice is global to the user. Starting from whatever currently
    /// applies in `guild_id` makes the first toggle in an opt-in guild turn
    /// replies on rather than off.
    pub async fn toggle_user_state(&self, user_id: UserId, guild_id: Option<GuildId>) -> Result<bool> {
        let new_state = !self.auto_response_enabled(guild_id, user_id).await?;

        sqlx::query(
            r#"
            INSERT INTO user_opt (user_id, state) VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET state = excluded.state
            "#,
        )
        .bind(to_db_id(user_id))
        .bind(new_state)
        .execute(&self.pool)
        .await
        .context("failed to save user auto-response state")?;

        tracing::debug!(user_id, new_state, "user auto-response toggled");
        Ok(new_state)
    }

    /// Flip the guild default between opt-out (true) and opt-in (false) and
    /// return the new default.
    pub async fn toggle_guild_state(&self, guild_id: GuildId) -> Result<bool> {
        let current: Option<bool> =
            sqlx::query_scalar("SELECT state FROM guild_opt WHERE guild_id = ?")
                .bind(to_db_id(guild_id))
                .fetch_optional(&self.pool)
                .await
                .context("failed to read guild auto-response state")?;
        let new_state = !current.unwrap_or(true);

        sqlx::query(
            r#"
            INSERT INTO guild_opt (guild_id, state) VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET state = excluded.state
            "#,
        )
        .bind(to_db_id(guild_id))
        .bind(new_state)
        .execute(&self.pool)
        .await
        .context("failed to save guild auto-response state")?;

        tracing::debug!(guild_id, new_state, "guild auto-response default toggled");
        Ok(new_state)
    }

    /// Blacklist a user with a reason, or lift the blacklist with `None`.
    pub async fn set_user_blacklist(&self, user_id: UserId, reason: Option<&str>) -> Result<()> {
        match reason {
            Some(reason) => {
                sqlx::query(
                    r#"
                    INSERT INTO user_blacklist (user_id, reason) VALUES (?, ?)
                    ON CONFLICT(user_id) DO UPDATE SET reason = excluded.reason
                    "#,
                )
                .bind(to_db_id(user_id))
                .bind(reason)
                .execute(&self.pool)
                .await
                .context("failed to blacklist user")?;
            }
            None => {
                sqlx::query("DELETE FROM user_blacklist WHERE user_id = ?")
                    .bind(to_db_id(user_id))
                    .execute(&self.pool)
                    .await
                    .context("failed to lift user blacklist")?;
            }
        }

        Ok(())
    }
}

impl EmoteStore for SqliteEmoteStore {
    async fn get_emote(&self, name: &str) -> Result<Option<Emote>> {
        self.fetch_emote(name).await
    }

    async fn log_emote_use(&self, emote_id: EmoteId, user_id: UserId) -> Result<()> {
        sqlx::query("INSERT INTO emote_usage_history (emote_id, user_id) VALUES (?, ?)")
            .bind(to_db_id(emote_id))
            .bind(to_db_id(user_id))
            .execute(&self.pool)
            .await
            .context("failed to log emote use")?;

        Ok(())
    }

    /// The user's own choice wins; otherwise the guild default; otherwise on.
    /// Direct messages have no guild default.
    async fn auto_response_enabled(&self, guild_id: Option<GuildId>, user_id: UserId) -> Result<bool> {
        let enabled: bool = sqlx::query_scalar(
            r#"
            SELECT COALESCE(
                (SELECT state FROM user_opt WHERE user_id = ?),
                (SELECT state FROM guild_opt WHERE guild_id = ?),
                1
            )
            "#,
        )
        .bind(to_db_id(user_id))
        .bind(guild_id.map(to_db_id))
        .fetch_one(&self.pool)
        .await
        .context("failed to read auto-response state")?;

        Ok(enabled)
    }

    async fn blacklist_reason(&self, user_id: UserId) -> Result<Option<String>> {
        let reason: Option<String> =
            sqlx::query_scalar("SELECT reason FROM user_blacklist WHERE user_id = ?")
                .bind(to_db_id(user_id))
                .fetch_optional(&self.pool)
                .await
                .context("failed to read user blacklist")?;

        Ok(reason)
    }
}

fn emote_from_row(row: &SqliteRow) -> std::result::Result<Emote, sqlx::Error> {
    Ok(Emote {
        id: from_db_id(row.try_get("id")?),
        name: row.try_get("name")?,
        animated: row.try_get("animated")?,
        author_id: from_db_id(row.try_get("author_id")?),
        description: row.try_get("description")?,
        created_at: Some(row.try_get("created_at")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    async fn setup_store() -> SqliteEmoteStore {
        SqliteEmoteStore::new(memory_pool().await)
    }

    fn new_emote(id: EmoteId, name: &str) -> NewEmote {
        NewEmote {
            id,
            name: name.to_string(),
            animated: false,
            author_id: 7,
            description: None,
        }
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive_and_misses_are_none() {
        let store = setup_store().await;
        store
            .create_emote(new_emote(421_349_768_125_513_728, "BlobCat"))
            .await
            .expect("emote should be created");

        let found = store
            .get_emote("blobcat")
            .await
            .expect("lookup should succeed")
            .expect("emote should be found");
        assert_eq!(found.name, "BlobCat");
        assert_eq!(found.id, 421_349_768_125_513_728);
        assert!(found.created_at.is_some());

        let missing = store.get_emote("nope").await.expect("lookup should succeed");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn undecodable_rows_are_errors_not_blanks() {
        let store = setup_store().await;
        sqlx::query(
            "INSERT INTO emotes (id, name, author_id, created_at) VALUES (3, 'broken', 7, 'not a time')",
        )
        .execute(&store.pool)
        .await
        .expect("raw insert should succeed");

        let error = store
            .get_emote("broken")
            .await
            .expect_err("bad timestamp should not decode");
        assert!(error.to_string().contains("failed to decode emote row"));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let store = setup_store().await;
        store
            .create_emote(new_emote(1, "thonk"))
            .await
            .expect("first emote should be created");

        let error = store
            .create_emote(new_emote(2, "THONK"))
            .await
            .expect_err("names are unique regardless of case");
        assert!(error.to_string().contains("failed to create emote"));
    }

    #[tokio::test]
    async fn usage_is_counted_per_call() {
        let store = setup_store().await;
        let emote = store
            .create_emote(new_emote(10, "xd"))
            .await
            .expect("emote should be created");

        tokio_test::assert_ok!(store.log_emote_use(emote.id, 1).await);
        tokio_test::assert_ok!(store.log_emote_use(emote.id, 2).await);

        assert_eq!(store.emote_usage(emote.id).await.expect("count"), 2);
        assert_eq!(store.emote_usage(999).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn user_choice_overrides_guild_default() {
        let store = setup_store().await;
        let guild = Some(100);

        assert!(store.auto_response_enabled(guild, 1).await.expect("state"));

        // guild switches to opt-in
        assert!(!store.toggle_guild_state(100).await.expect("toggle guild"));
        assert!(!store.auto_response_enabled(guild, 1).await.expect("state"));
        // direct messages are unaffected by any guild
        assert!(store.auto_response_enabled(None, 1).await.expect("state"));

        // the user opts in explicitly
        assert!(store.toggle_user_state(1, guild).await.expect("toggle user"));
        assert!(store.auto_response_enabled(guild, 1).await.expect("state"));

        // and back out again
        assert!(!store.toggle_user_state(1, guild).await.expect("toggle user"));
        assert!(!store.auto_response_enabled(None, 1).await.expect("state"));
    }

    #[tokio::test]
    async fn blacklist_can_be_set_and_lifted() {
        let store = setup_store().await;

        store
            .set_user_blacklist(5, Some("spamming emotes"))
            .await
            .expect("blacklist should be set");
        assert_eq!(
            store.blacklist_reason(5).await.expect("reason").as_deref(),
            Some("spamming emotes")
        );

        store.set_user_blacklist(5, None).await.expect("blacklist should lift");
        assert!(store.blacklist_reason(5).await.expect("reason").is_none());
    }
}
