//! Room commands: the owner-gated mutations plus guild-admin maintenance.
//!
//! Commands arrive as a tagged [`CommandRequest`] and dispatch through one
//! handler function per variant. Every owner-gated handler re-reads the room
//! registry via [`SessionController::authorize`] immediately before acting;
//! nothing trusts ownership learned earlier in the session.
//!
//! Validation happens before any remote call. Replies are short ephemeral
//! sentences for the member who issued the command.

use super::{MAX_CHANNEL_NAME_LEN, SessionController};
use crate::db::{GuildConfigRecord, RoomRecord};
use crate::error::{CommandError, CommandResult};
use crate::ids::{GuildId, UserId};
use crate::metrics;
use crate::reconciler;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Invite defaults when the member gives no arguments.
const DEFAULT_INVITE_MAX_AGE_SECS: u32 = 3600;
const DEFAULT_INVITE_MAX_USES: u16 = 5;

/// Bounds accepted by the platform.
const MAX_INVITE_AGE_SECS: u32 = 86_400;
const MAX_INVITE_USES: u16 = 100;
const MAX_USER_LIMIT: u16 = 99;

/// Message posted to the rules channel by `setup`.
const RULES_MESSAGE: &str = "\
Voice channel rules and commands

Rules:
1. Be respectful to others.
2. No spamming or excessive noise.
3. Follow the server's general rules.
Violating these rules may result in removal from the voice channel.

Commands:
/voice rename <new_name> - Rename your voice room.
/voice limit <number> - Set a user limit for your voice room.
/voice privacy <public|private> - Make your voice room public or private.
/voice kick <user> - Kick a user from your voice room.
/voice ban <user> - Ban a user from your voice room.
/voice unban <user> - Unban a user from your voice room.
/voice invite - Generate an invite link for your voice room.";

/// A room command, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CommandRequest {
    /// Create the lobby/category/rules channels and persist the guild config.
    Setup,
    /// Delete the setup channels and the guild config.
    Reset,
    /// Sweep this guild's rooms against remote reality.
    Cleanup,
    Rename {
        name: String,
    },
    Limit {
        limit: u16,
    },
    Privacy {
        mode: PrivacyMode,
    },
    Kick {
        user_id: UserId,
    },
    Ban {
        user_id: UserId,
    },
    Unban {
        user_id: UserId,
    },
    Invite {
        #[serde(default = "default_invite_max_age")]
        max_age_secs: u32,
        #[serde(default = "default_invite_max_uses")]
        max_uses: u16,
    },
}

fn default_invite_max_age() -> u32 {
    DEFAULT_INVITE_MAX_AGE_SECS
}

fn default_invite_max_uses() -> u16 {
    DEFAULT_INVITE_MAX_USES
}

impl CommandRequest {
    /// Command kind label for metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Reset => "reset",
            Self::Cleanup => "cleanup",
            Self::Rename { .. } => "rename",
            Self::Limit { .. } => "limit",
            Self::Privacy { .. } => "privacy",
            Self::Kick { .. } => "kick",
            Self::Ban { .. } => "ban",
            Self::Unban { .. } => "unban",
            Self::Invite { .. } => "invite",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyMode {
    Public,
    Private,
}

/// A command plus the identity the platform edge authenticated.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandEnvelope {
    pub guild_id: GuildId,
    pub actor_id: UserId,
    /// Whether the platform reports the actor as holding the guild's
    /// manage-channels permission. Gates setup/reset/cleanup.
    #[serde(default)]
    pub actor_is_admin: bool,
    #[serde(flatten)]
    pub command: CommandRequest,
}

/// The ephemeral reply for the issuing member.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReply {
    pub message: String,
}

impl CommandReply {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl SessionController {
    /// Execute one command. The explicit per-kind table keeps dispatch
    /// greppable; adding a command means adding a variant and an arm.
    pub async fn dispatch_command(
        &self,
        envelope: &CommandEnvelope,
    ) -> CommandResult<CommandReply> {
        let command_name = envelope.command.name();
        metrics::record_command(command_name);

        let result = match &envelope.command {
            CommandRequest::Setup => self.cmd_setup(envelope).await,
            CommandRequest::Reset => self.cmd_reset(envelope).await,
            CommandRequest::Cleanup => self.cmd_cleanup(envelope).await,
            CommandRequest::Rename { name } => self.cmd_rename(envelope, name).await,
            CommandRequest::Limit { limit } => self.cmd_limit(envelope, *limit).await,
            CommandRequest::Privacy { mode } => self.cmd_privacy(envelope, *mode).await,
            CommandRequest::Kick { user_id } => self.cmd_kick(envelope, *user_id).await,
            CommandRequest::Ban { user_id } => self.cmd_ban(envelope, *user_id).await,
            CommandRequest::Unban { user_id } => self.cmd_unban(envelope, *user_id).await,
            CommandRequest::Invite {
                max_age_secs,
                max_uses,
            } => self.cmd_invite(envelope, *max_age_secs, *max_uses).await,
        };

        if let Err(e) = &result {
            metrics::record_command_error(command_name, e.error_code());
        }
        result
    }

    /// The ownership gate. Re-reads both the actor's voice state and the
    /// room registry; fails with `NotInRoom` or `NotOwner`.
    async fn authorize(&self, guild: GuildId, actor: UserId) -> CommandResult<RoomRecord> {
        let channel = self
            .gateway()
            .current_channel(guild, actor)
            .await?
            .ok_or(CommandError::NotInRoom)?;

        let room = self
            .db()
            .rooms()
            .find(guild, channel)
            .await?
            .ok_or(CommandError::NotInRoom)?;

        if room.owner_id != actor {
            return Err(CommandError::NotOwner);
        }
        Ok(room)
    }

    fn require_admin(envelope: &CommandEnvelope) -> CommandResult<()> {
        if envelope.actor_is_admin {
            Ok(())
        } else {
            Err(CommandError::MissingPrivileges)
        }
    }

    // ========================================================================
    // Guild-admin commands
    // ========================================================================

    async fn cmd_setup(&self, envelope: &CommandEnvelope) -> CommandResult<CommandReply> {
        Self::require_admin(envelope)?;
        let guild = envelope.guild_id;

        if self.db().configs().get(guild).await?.is_some() {
            return Ok(CommandReply::new(
                "Server configuration already exists. Use `reset` to remove it first.",
            ));
        }

        let gateway = self.gateway();
        let lobby_category = gateway.create_category(guild, "voice lobby").await?;
        let lobby = gateway
            .create_voice_channel(guild, "start vc", Some(lobby_category))
            .await?;
        let active_category = gateway.create_category(guild, "active channels").await?;
        let rules = gateway
            .create_text_channel(guild, "rules-and-commands", Some(lobby_category))
            .await?;

        // The config is what makes the guild live; the rules post is cosmetic
        // and must not fail setup.
        if let Err(e) = gateway.post_message(guild, rules, RULES_MESSAGE).await {
            warn!(guild = %guild, error = %e, "Failed to post rules message");
        }

        self.db()
            .configs()
            .set(&GuildConfigRecord {
                guild_id: guild,
                lobby_channel_id: lobby,
                lobby_category_id: lobby_category,
                active_category_id: active_category,
                rules_channel_id: rules,
            })
            .await?;

        info!(guild = %guild, lobby = %lobby, "Guild configuration created");
        Ok(CommandReply::new("Server configuration has been created."))
    }

    async fn cmd_reset(&self, envelope: &CommandEnvelope) -> CommandResult<CommandReply> {
        Self::require_admin(envelope)?;
        let guild = envelope.guild_id;

        let Some(config) = self.db().configs().get(guild).await? else {
            return Ok(CommandReply::new(
                "Server configuration does not exist. Use `setup` to create one.",
            ));
        };

        // Lobby first: with the entry point gone, no new rooms can spawn
        // while the rest is torn down.
        let doomed = [
            config.lobby_channel_id,
            config.rules_channel_id,
            config.lobby_category_id,
            config.active_category_id,
        ];
        for channel in doomed {
            match self.gateway().delete_channel(guild, channel).await {
                Ok(()) => {}
                Err(crate::remote::RemoteError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.db().configs().remove(guild).await?;
        info!(guild = %guild, "Guild configuration removed");
        Ok(CommandReply::new("Server configuration has been removed."))
    }

    async fn cmd_cleanup(&self, envelope: &CommandEnvelope) -> CommandResult<CommandReply> {
        Self::require_admin(envelope)?;

        let report = reconciler::reconcile_guild(self, envelope.guild_id).await?;
        if report.scanned == 0 {
            return Ok(CommandReply::new("No temporary rooms to clean up."));
        }
        Ok(CommandReply::new(format!(
            "Cleanup completed: {} room(s) checked, {} removed, {} ownership(s) healed.",
            report.scanned, report.removed, report.transferred
        )))
    }

    // ========================================================================
    // Owner commands
    // ========================================================================

    async fn cmd_rename(
        &self,
        envelope: &CommandEnvelope,
        name: &str,
    ) -> CommandResult<CommandReply> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CommandError::Validation(
                "Channel name must not be empty.".into(),
            ));
        }
        if name.chars().count() > MAX_CHANNEL_NAME_LEN {
            return Err(CommandError::Validation(
                "Channel name is too long, must be under 100 characters.".into(),
            ));
        }

        let room = self.authorize(envelope.guild_id, envelope.actor_id).await?;
        self.gateway()
            .rename_channel(envelope.guild_id, room.channel_id, name)
            .await?;

        info!(guild = %envelope.guild_id, channel = %room.channel_id, name = %name,
              "Room renamed");
        Ok(CommandReply::new(format!(
            "Channel name has been changed to {name}."
        )))
    }

    async fn cmd_limit(&self, envelope: &CommandEnvelope, limit: u16) -> CommandResult<CommandReply> {
        if limit > MAX_USER_LIMIT {
            return Err(CommandError::Validation(
                "Limit must be between 0 and 99.".into(),
            ));
        }

        let room = self.authorize(envelope.guild_id, envelope.actor_id).await?;
        self.gateway()
            .set_user_limit(envelope.guild_id, room.channel_id, limit)
            .await?;

        Ok(CommandReply::new(format!(
            "User limit has been set to {limit}."
        )))
    }

    async fn cmd_privacy(
        &self,
        envelope: &CommandEnvelope,
        mode: PrivacyMode,
    ) -> CommandResult<CommandReply> {
        let room = self.authorize(envelope.guild_id, envelope.actor_id).await?;

        let allowed = mode == PrivacyMode::Public;
        self.gateway()
            .set_everyone_connect(envelope.guild_id, room.channel_id, allowed)
            .await?;

        let reply = if allowed {
            "Channel is now public."
        } else {
            "Channel is now private."
        };
        Ok(CommandReply::new(reply))
    }

    async fn cmd_kick(&self, envelope: &CommandEnvelope, target: UserId) -> CommandResult<CommandReply> {
        let guild = envelope.guild_id;
        let room = self.authorize(guild, envelope.actor_id).await?;

        if self.gateway().current_channel(guild, target).await? != Some(room.channel_id) {
            return Ok(CommandReply::new("That user is not in your voice room."));
        }

        self.gateway().move_member(guild, target, None).await?;
        info!(guild = %guild, channel = %room.channel_id, target = %target, "Kicked member from room");
        Ok(CommandReply::new(format!("User {target} has been kicked.")))
    }

    /// Revoke connect, disconnect if present, then record — in that order.
    /// If the permission change fails the ban is not recorded, so local
    /// state never claims a ban the remote is not enforcing.
    async fn cmd_ban(&self, envelope: &CommandEnvelope, target: UserId) -> CommandResult<CommandReply> {
        let guild = envelope.guild_id;
        let room = self.authorize(guild, envelope.actor_id).await?;

        if self
            .db()
            .bans()
            .is_banned(guild, room.channel_id, target)
            .await?
        {
            return Ok(CommandReply::new(format!(
                "User {target} is already banned."
            )));
        }

        self.gateway()
            .set_connect_permission(guild, room.channel_id, target, false)
            .await?;

        // Connect is revoked, so even if the disconnect fails the target
        // cannot rejoin; record the ban either way.
        if self.gateway().current_channel(guild, target).await? == Some(room.channel_id) {
            if let Err(e) = self.gateway().move_member(guild, target, None).await {
                warn!(guild = %guild, channel = %room.channel_id, target = %target, error = %e,
                      "Banned member could not be disconnected");
            }
        }

        self.db()
            .bans()
            .add(guild, room.channel_id, target, envelope.actor_id)
            .await?;

        info!(guild = %guild, channel = %room.channel_id, target = %target, "Banned member from room");
        Ok(CommandReply::new(format!("User {target} has been banned.")))
    }

    async fn cmd_unban(&self, envelope: &CommandEnvelope, target: UserId) -> CommandResult<CommandReply> {
        let guild = envelope.guild_id;
        let room = self.authorize(guild, envelope.actor_id).await?;

        if !self
            .db()
            .bans()
            .is_banned(guild, room.channel_id, target)
            .await?
        {
            return Ok(CommandReply::new(format!("User {target} is not banned.")));
        }

        // Restore first; a failed restore keeps the record, never the other
        // way around.
        self.gateway()
            .set_connect_permission(guild, room.channel_id, target, true)
            .await?;

        self.db()
            .bans()
            .remove(guild, room.channel_id, target)
            .await?;

        info!(guild = %guild, channel = %room.channel_id, target = %target, "Unbanned member from room");
        Ok(CommandReply::new(format!(
            "User {target} has been unbanned."
        )))
    }

    async fn cmd_invite(
        &self,
        envelope: &CommandEnvelope,
        max_age_secs: u32,
        max_uses: u16,
    ) -> CommandResult<CommandReply> {
        if max_age_secs == 0 || max_age_secs > MAX_INVITE_AGE_SECS {
            return Err(CommandError::Validation(
                "Invite expiry must be between 1 and 86400 seconds.".into(),
            ));
        }
        if max_uses == 0 || max_uses > MAX_INVITE_USES {
            return Err(CommandError::Validation(
                "Invite max uses must be between 1 and 100.".into(),
            ));
        }

        let room = self.authorize(envelope.guild_id, envelope.actor_id).await?;
        let url = self
            .gateway()
            .create_invite(envelope.guild_id, room.channel_id, max_age_secs, max_uses)
            .await?;

        Ok(CommandReply::new(format!(
            "Here is your invite link:\n{url}\nExpires in {} minute(s) | Max uses: {max_uses}",
            max_age_secs / 60
        )))
    }
}
