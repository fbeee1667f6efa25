//! Per-room ban registry.
//!
//! Rows are keyed `(guild, channel, banned user)`. They are written only
//! after the remote permission change succeeded, and purged together with
//! their room record (channel ids are never reused, so rows for a deleted
//! room would be unreachable forever).

use super::DbError;
use crate::ids::{ChannelId, GuildId, UserId};
use sqlx::SqlitePool;

/// A single ban entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanRecord {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub banned_user_id: UserId,
    pub banned_by: UserId,
    pub banned_at: i64,
}

/// Repository for room ban lists.
pub struct BanRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BanRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a ban. Idempotent: re-banning an already banned member is a no-op.
    pub async fn add(
        &self,
        guild: GuildId,
        channel: ChannelId,
        target: UserId,
        banned_by: UserId,
    ) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO room_bans
                (guild_id, channel_id, banned_user_id, banned_by, banned_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(guild.0)
        .bind(channel.0)
        .bind(target.0)
        .bind(banned_by.0)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove a ban. Returns whether a row existed.
    pub async fn remove(
        &self,
        guild: GuildId,
        channel: ChannelId,
        target: UserId,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "DELETE FROM room_bans WHERE guild_id = ? AND channel_id = ? AND banned_user_id = ?",
        )
        .bind(guild.0)
        .bind(channel.0)
        .bind(target.0)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_banned(
        &self,
        guild: GuildId,
        channel: ChannelId,
        target: UserId,
    ) -> Result<bool, DbError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM room_bans WHERE guild_id = ? AND channel_id = ? AND banned_user_id = ?",
        )
        .bind(guild.0)
        .bind(channel.0)
        .bind(target.0)
        .fetch_one(self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Banned member ids for a room, oldest ban first.
    pub async fn list(&self, guild: GuildId, channel: ChannelId) -> Result<Vec<UserId>, DbError> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT banned_user_id FROM room_bans WHERE guild_id = ? AND channel_id = ? ORDER BY banned_at, banned_user_id",
        )
        .bind(guild.0)
        .bind(channel.0)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|(u,)| UserId(u)).collect())
    }

    /// Drop every ban row for a room. Called when the room is deleted.
    pub async fn purge_channel(&self, guild: GuildId, channel: ChannelId) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM room_bans WHERE guild_id = ? AND channel_id = ?")
            .bind(guild.0)
            .bind(channel.0)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
