//! Bounded-timeout, single-retry decorator for room gateways.
//!
//! Policy: every remote call is capped by a timeout; a transient failure
//! (rate limit, transport, 5xx) is retried exactly once after a short pause.
//! Forbidden and not-found answers are definitive and returned as-is. There
//! is no cancellation and no backoff ladder.

use super::{RemoteError, RemoteResult, RoomGateway};
use crate::ids::{ChannelId, GuildId, UserId};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Wraps any gateway with the timeout/retry policy.
pub struct Retry<G> {
    inner: G,
    timeout: Duration,
    backoff: Duration,
}

impl<G> Retry<G> {
    pub fn new(inner: G, timeout: Duration, backoff: Duration) -> Self {
        Self {
            inner,
            timeout,
            backoff,
        }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Other(format!(
                "request timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

// The call expression is expanded twice: once for the first attempt, once for
// the retry. Arguments are ids and borrows, so rebuilding the future is free.
macro_rules! attempt {
    ($self:ident, $label:literal, $call:expr) => {{
        match $self.bounded($call).await {
            Err(e) if e.is_transient() => {
                crate::metrics::remote_retry();
                tracing::debug!(call = $label, error = %e, "transient remote failure, retrying once");
                tokio::time::sleep($self.backoff).await;
                $self.bounded($call).await
            }
            other => other,
        }
    }};
}

#[async_trait]
impl<G: RoomGateway> RoomGateway for Retry<G> {
    async fn create_voice_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
    ) -> RemoteResult<ChannelId> {
        attempt!(self, "create_voice_channel", self.inner.create_voice_channel(guild, name, parent))
    }

    async fn create_category(&self, guild: GuildId, name: &str) -> RemoteResult<ChannelId> {
        attempt!(self, "create_category", self.inner.create_category(guild, name))
    }

    async fn create_text_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
    ) -> RemoteResult<ChannelId> {
        attempt!(self, "create_text_channel", self.inner.create_text_channel(guild, name, parent))
    }

    async fn delete_channel(&self, guild: GuildId, channel: ChannelId) -> RemoteResult<()> {
        attempt!(self, "delete_channel", self.inner.delete_channel(guild, channel))
    }

    async fn move_member(
        &self,
        guild: GuildId,
        member: UserId,
        to: Option<ChannelId>,
    ) -> RemoteResult<()> {
        attempt!(self, "move_member", self.inner.move_member(guild, member, to))
    }

    async fn set_connect_permission(
        &self,
        guild: GuildId,
        channel: ChannelId,
        member: UserId,
        allowed: bool,
    ) -> RemoteResult<()> {
        attempt!(
            self,
            "set_connect_permission",
            self.inner.set_connect_permission(guild, channel, member, allowed)
        )
    }

    async fn set_everyone_connect(
        &self,
        guild: GuildId,
        channel: ChannelId,
        allowed: bool,
    ) -> RemoteResult<()> {
        attempt!(
            self,
            "set_everyone_connect",
            self.inner.set_everyone_connect(guild, channel, allowed)
        )
    }

    async fn rename_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
        name: &str,
    ) -> RemoteResult<()> {
        attempt!(self, "rename_channel", self.inner.rename_channel(guild, channel, name))
    }

    async fn set_user_limit(
        &self,
        guild: GuildId,
        channel: ChannelId,
        limit: u16,
    ) -> RemoteResult<()> {
        attempt!(self, "set_user_limit", self.inner.set_user_limit(guild, channel, limit))
    }

    async fn create_invite(
        &self,
        guild: GuildId,
        channel: ChannelId,
        max_age_secs: u32,
        max_uses: u16,
    ) -> RemoteResult<String> {
        attempt!(
            self,
            "create_invite",
            self.inner.create_invite(guild, channel, max_age_secs, max_uses)
        )
    }

    async fn post_message(
        &self,
        guild: GuildId,
        channel: ChannelId,
        text: &str,
    ) -> RemoteResult<()> {
        attempt!(self, "post_message", self.inner.post_message(guild, channel, text))
    }

    async fn occupants(&self, guild: GuildId, channel: ChannelId) -> RemoteResult<Vec<UserId>> {
        attempt!(self, "occupants", self.inner.occupants(guild, channel))
    }

    async fn current_channel(
        &self,
        guild: GuildId,
        member: UserId,
    ) -> RemoteResult<Option<ChannelId>> {
        attempt!(self, "current_channel", self.inner.current_channel(guild, member))
    }
}
