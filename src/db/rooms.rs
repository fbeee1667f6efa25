//! Active-room registry.
//!
//! The single source of truth for which channels are ephemeral rooms and who
//! owns them. Every controller decision re-reads this table; nothing caches
//! ownership in memory.

use super::DbError;
use crate::ids::{ChannelId, GuildId, UserId};
use sqlx::SqlitePool;

/// A live ephemeral room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomRecord {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub owner_id: UserId,
}

/// Repository for room records.
pub struct RoomRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoomRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a room (upsert — replaying a create event must not fail).
    pub async fn add(
        &self,
        guild: GuildId,
        channel: ChannelId,
        owner: UserId,
    ) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO rooms (guild_id, channel_id, owner_id, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(guild_id, channel_id) DO UPDATE SET owner_id = excluded.owner_id
            "#,
        )
        .bind(guild.0)
        .bind(channel.0)
        .bind(owner.0)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove a room record. Returns whether a row existed.
    pub async fn remove(&self, guild: GuildId, channel: ChannelId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM rooms WHERE guild_id = ? AND channel_id = ?")
            .bind(guild.0)
            .bind(channel.0)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Look up a single room.
    pub async fn find(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<Option<RoomRecord>, DbError> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT owner_id FROM rooms WHERE guild_id = ? AND channel_id = ?",
        )
        .bind(guild.0)
        .bind(channel.0)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(owner_id,)| RoomRecord {
            guild_id: guild,
            channel_id: channel,
            owner_id: UserId(owner_id),
        }))
    }

    /// All rooms tracked for a guild, oldest first.
    pub async fn list(&self, guild: GuildId) -> Result<Vec<RoomRecord>, DbError> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            "SELECT channel_id, owner_id FROM rooms WHERE guild_id = ? ORDER BY created_at, channel_id",
        )
        .bind(guild.0)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(channel_id, owner_id)| RoomRecord {
                guild_id: guild,
                channel_id: ChannelId(channel_id),
                owner_id: UserId(owner_id),
            })
            .collect())
    }

    /// Every guild with at least one tracked room. Drives the periodic sweep.
    pub async fn guilds(&self) -> Result<Vec<GuildId>, DbError> {
        let rows = sqlx::query_as::<_, (i64,)>("SELECT DISTINCT guild_id FROM rooms")
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(|(g,)| GuildId(g)).collect())
    }

    /// Persist an ownership transfer. Returns whether the room still existed.
    pub async fn update_owner(
        &self,
        guild: GuildId,
        channel: ChannelId,
        new_owner: UserId,
    ) -> Result<bool, DbError> {
        let result =
            sqlx::query("UPDATE rooms SET owner_id = ? WHERE guild_id = ? AND channel_id = ?")
                .bind(new_owner.0)
                .bind(guild.0)
                .bind(channel.0)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn add_is_idempotent_and_updates_owner() {
        let db = Database::new(":memory:").await.unwrap();
        let (g, c) = (GuildId(1), ChannelId(10));

        db.rooms().add(g, c, UserId(100)).await.unwrap();
        db.rooms().add(g, c, UserId(200)).await.unwrap();

        let rooms = db.rooms().list(g).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].owner_id, UserId(200));
    }

    #[tokio::test]
    async fn find_update_remove() {
        let db = Database::new(":memory:").await.unwrap();
        let (g, c) = (GuildId(1), ChannelId(10));

        assert!(db.rooms().find(g, c).await.unwrap().is_none());

        db.rooms().add(g, c, UserId(100)).await.unwrap();
        assert!(db.rooms().update_owner(g, c, UserId(300)).await.unwrap());
        assert_eq!(
            db.rooms().find(g, c).await.unwrap().map(|r| r.owner_id),
            Some(UserId(300))
        );

        assert!(db.rooms().remove(g, c).await.unwrap());
        assert!(!db.rooms().remove(g, c).await.unwrap());
        assert!(!db.rooms().update_owner(g, c, UserId(1)).await.unwrap());
    }

    #[tokio::test]
    async fn guilds_lists_each_guild_once() {
        let db = Database::new(":memory:").await.unwrap();

        db.rooms().add(GuildId(1), ChannelId(10), UserId(1)).await.unwrap();
        db.rooms().add(GuildId(1), ChannelId(11), UserId(2)).await.unwrap();
        db.rooms().add(GuildId(2), ChannelId(20), UserId(3)).await.unwrap();

        let mut guilds = db.rooms().guilds().await.unwrap();
        guilds.sort();
        assert_eq!(guilds, vec![GuildId(1), GuildId(2)]);
    }
}
