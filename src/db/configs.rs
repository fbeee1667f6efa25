//! Guild configuration repository.
//!
//! One row per guild, written by `setup` and removed by `reset`. Absence of a
//! row means the guild is unconfigured and its membership events are ignored.

use super::DbError;
use crate::ids::{ChannelId, GuildId};
use sqlx::SqlitePool;

/// A guild's lobby/category configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildConfigRecord {
    pub guild_id: GuildId,
    /// The lobby entry point: joining this voice channel spawns a room.
    pub lobby_channel_id: ChannelId,
    /// Category holding the lobby channel and the rules channel.
    pub lobby_category_id: ChannelId,
    /// Category that newly created rooms are placed under.
    pub active_category_id: ChannelId,
    /// Text channel carrying the rules/commands message.
    pub rules_channel_id: ChannelId,
}

/// Repository for guild configuration.
pub struct ConfigRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ConfigRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a guild's configuration, if it has been set up.
    pub async fn get(&self, guild: GuildId) -> Result<Option<GuildConfigRecord>, DbError> {
        let row = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT lobby_channel_id, lobby_category_id, active_category_id, rules_channel_id
            FROM guild_configs
            WHERE guild_id = ?
            "#,
        )
        .bind(guild.0)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(
            |(lobby_channel_id, lobby_category_id, active_category_id, rules_channel_id)| {
                GuildConfigRecord {
                    guild_id: guild,
                    lobby_channel_id: ChannelId(lobby_channel_id),
                    lobby_category_id: ChannelId(lobby_category_id),
                    active_category_id: ChannelId(active_category_id),
                    rules_channel_id: ChannelId(rules_channel_id),
                }
            },
        ))
    }

    /// Store a guild's configuration (upsert).
    pub async fn set(&self, config: &GuildConfigRecord) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO guild_configs
                (guild_id, lobby_channel_id, lobby_category_id, active_category_id, rules_channel_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                lobby_channel_id = excluded.lobby_channel_id,
                lobby_category_id = excluded.lobby_category_id,
                active_category_id = excluded.active_category_id,
                rules_channel_id = excluded.rules_channel_id
            "#,
        )
        .bind(config.guild_id.0)
        .bind(config.lobby_channel_id.0)
        .bind(config.lobby_category_id.0)
        .bind(config.active_category_id.0)
        .bind(config.rules_channel_id.0)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove a guild's configuration. Returns whether a row existed.
    pub async fn remove(&self, guild: GuildId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM guild_configs WHERE guild_id = ?")
            .bind(guild.0)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
