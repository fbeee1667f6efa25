//! The platform's room API, behind a trait.
//!
//! Everything effectful the controller does to the outside world goes through
//! [`RoomGateway`]: channel creation/deletion, member moves, permission
//! overrides, invites. The production implementation is [`HttpRoomGateway`];
//! tests substitute a scripted fake. [`Retry`] decorates any gateway with the
//! bounded-timeout, single-retry policy.
//!
//! None of these calls participate in a transaction with the local registry.
//! The caller decides, per operation, which side to mutate first and what a
//! half-completed pair means.

mod http;
mod retry;

pub use http::HttpRoomGateway;
pub use retry::Retry;

use crate::ids::{ChannelId, GuildId, UserId};
use async_trait::async_trait;
use thiserror::Error;

/// Remote room API errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The bot lacks permission for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The referenced channel, member or guild does not exist remotely.
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform asked us to slow down.
    #[error("rate limited")]
    RateLimited,

    /// Transport failures, timeouts, 5xx responses and everything else.
    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    /// Whether a single immediate retry is worth attempting.
    ///
    /// Permission and not-found failures are definitive; retrying them only
    /// repeats the answer.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Other(_))
    }

    /// Static error code for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "remote_forbidden",
            Self::NotFound(_) => "remote_not_found",
            Self::RateLimited => "rate_limited",
            Self::Other(_) => "remote_other",
        }
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// The room API surface the controller consumes.
///
/// `occupants` doubles as the existence probe: `NotFound` means the channel
/// is gone remotely, which the reconciler treats as "already deleted".
#[async_trait]
pub trait RoomGateway: Send + Sync {
    /// Create a voice channel, optionally under a category.
    async fn create_voice_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
    ) -> RemoteResult<ChannelId>;

    /// Create a category.
    async fn create_category(&self, guild: GuildId, name: &str) -> RemoteResult<ChannelId>;

    /// Create a text channel, optionally under a category.
    async fn create_text_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
    ) -> RemoteResult<ChannelId>;

    /// Delete any channel or category.
    async fn delete_channel(&self, guild: GuildId, channel: ChannelId) -> RemoteResult<()>;

    /// Move a member into a voice channel, or out of voice entirely (`None`).
    async fn move_member(
        &self,
        guild: GuildId,
        member: UserId,
        to: Option<ChannelId>,
    ) -> RemoteResult<()>;

    /// Set a member's connect permission override on a channel.
    async fn set_connect_permission(
        &self,
        guild: GuildId,
        channel: ChannelId,
        member: UserId,
        allowed: bool,
    ) -> RemoteResult<()>;

    /// Set the default (everyone) connect permission on a channel.
    async fn set_everyone_connect(
        &self,
        guild: GuildId,
        channel: ChannelId,
        allowed: bool,
    ) -> RemoteResult<()>;

    /// Rename a channel. Length is validated by the caller before this call.
    async fn rename_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
        name: &str,
    ) -> RemoteResult<()>;

    /// Set the occupancy limit of a voice channel (0 means unlimited).
    async fn set_user_limit(
        &self,
        guild: GuildId,
        channel: ChannelId,
        limit: u16,
    ) -> RemoteResult<()>;

    /// Create an invite link for a channel.
    async fn create_invite(
        &self,
        guild: GuildId,
        channel: ChannelId,
        max_age_secs: u32,
        max_uses: u16,
    ) -> RemoteResult<String>;

    /// Post a text message to a channel.
    async fn post_message(&self, guild: GuildId, channel: ChannelId, text: &str)
    -> RemoteResult<()>;

    /// Members currently connected to a voice channel.
    async fn occupants(&self, guild: GuildId, channel: ChannelId) -> RemoteResult<Vec<UserId>>;

    /// The voice channel a member is currently connected to, if any.
    async fn current_channel(
        &self,
        guild: GuildId,
        member: UserId,
    ) -> RemoteResult<Option<ChannelId>>;
}
