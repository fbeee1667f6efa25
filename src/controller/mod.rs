//! The session controller: turns membership-change events into room
//! lifecycle actions.
//!
//! One controller instance serves every guild; serialization per guild is the
//! dispatcher's job (`crate::dispatch`), so these methods can assume no other
//! event or command for the same guild runs concurrently.
//!
//! ## Lifecycle
//!
//! - A member entering the configured lobby channel gets a fresh voice room
//!   under the active category, is moved into it, and becomes its owner.
//! - A member leaving a tracked room either empties it (room is deleted
//!   remotely, then unregistered) or, if they owned it, hands ownership to
//!   the remaining occupant with the lowest user id.
//! - Remote effects and registry writes are not atomic. Creation failure
//!   writes nothing; a failed move-in after creation still writes the record
//!   (the reconciler collects orphans); a failed remote delete keeps the
//!   record for a later retry.

pub mod commands;

use crate::db::{Database, GuildConfigRecord};
use crate::ids::{ChannelId, GuildId, UserId};
use crate::metrics;
use crate::remote::{RemoteError, RoomGateway};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum channel name length the platform accepts.
pub const MAX_CHANNEL_NAME_LEN: usize = 100;

/// A member's voice transition, as reported by the platform edge.
///
/// `before`/`after` of `None` mean "not in voice". Events where both sides
/// are equal (mute/deafen toggles arrive like this) are no-ops here.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceEvent {
    pub guild_id: GuildId,
    pub member_id: UserId,
    /// Display name at event time, used only for naming a fresh room.
    #[serde(default)]
    pub member_display_name: Option<String>,
    pub before_channel_id: Option<ChannelId>,
    pub after_channel_id: Option<ChannelId>,
}

/// Decides room lifecycle actions and applies them to the gateway and the
/// registries.
pub struct SessionController {
    db: Database,
    gateway: Arc<dyn RoomGateway>,
}

impl SessionController {
    pub fn new(db: Database, gateway: Arc<dyn RoomGateway>) -> Self {
        Self { db, gateway }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn gateway(&self) -> &Arc<dyn RoomGateway> {
        &self.gateway
    }

    /// Consume one membership-change event.
    ///
    /// A single transition can both empty a tracked room and enter the lobby
    /// (moving from one's own room back to the lobby). The departure is
    /// processed first so an emptied room never outlives the event that
    /// emptied it.
    pub async fn handle_voice_event(&self, event: &VoiceEvent) {
        metrics::voice_event();

        if event.before_channel_id == event.after_channel_id {
            return;
        }

        let config = match self.db.configs().get(event.guild_id).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!(guild = %event.guild_id, "Ignoring event for unconfigured guild");
                return;
            }
            Err(e) => {
                warn!(guild = %event.guild_id, error = %e, "Config lookup failed, dropping event");
                return;
            }
        };

        if let Some(before) = event.before_channel_id {
            self.on_channel_leave(event.guild_id, event.member_id, before)
                .await;
        }

        if event.after_channel_id == Some(config.lobby_channel_id) {
            self.on_lobby_entry(&config, event).await;
        }
    }

    /// A member landed in the lobby entry point: spawn their room.
    async fn on_lobby_entry(&self, config: &GuildConfigRecord, event: &VoiceEvent) {
        let guild = event.guild_id;
        let member = event.member_id;
        let name = room_name(event.member_display_name.as_deref(), member);

        let room = match self
            .gateway
            .create_voice_channel(guild, &name, Some(config.active_category_id))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(guild = %guild, member = %member, error = %e,
                      "Room creation failed, nothing persisted");
                return;
            }
        };

        // The room exists remotely from here on. The record is written even
        // if the move-in fails: an empty orphan is the reconciler's problem,
        // an untracked room would be nobody's.
        if let Err(e) = self.gateway.move_member(guild, member, Some(room)).await {
            warn!(guild = %guild, member = %member, channel = %room, error = %e,
                  "Move into fresh room failed");
        }

        if let Err(e) = self.db.rooms().add(guild, room, member).await {
            warn!(guild = %guild, channel = %room, error = %e,
                  "Failed to record fresh room; it exists remotely but is untracked");
            return;
        }

        metrics::room_created();
        info!(guild = %guild, channel = %room, owner = %member, name = %name,
              "Created ephemeral room");
    }

    /// A member left a channel. If it was a tracked room, delete it when
    /// empty or hand off ownership when the owner departed.
    async fn on_channel_leave(&self, guild: GuildId, member: UserId, before: ChannelId) {
        let room = match self.db.rooms().find(guild, before).await {
            Ok(Some(room)) => room,
            Ok(None) => return,
            Err(e) => {
                warn!(guild = %guild, channel = %before, error = %e, "Room lookup failed");
                return;
            }
        };

        let occupants = match self.gateway.occupants(guild, before).await {
            Ok(occupants) => occupants,
            Err(RemoteError::NotFound(_)) => {
                // Already gone remotely; drop our record.
                self.unregister_room(guild, before).await;
                return;
            }
            Err(e) => {
                warn!(guild = %guild, channel = %before, error = %e,
                      "Occupancy probe failed, leaving room for the reconciler");
                return;
            }
        };

        // The platform may still report the departing member briefly.
        let remaining: Vec<UserId> = occupants.into_iter().filter(|&u| u != member).collect();

        if remaining.is_empty() {
            match self.gateway.delete_channel(guild, before).await {
                Ok(()) | Err(RemoteError::NotFound(_)) => {
                    self.unregister_room(guild, before).await;
                    info!(guild = %guild, channel = %before, "Deleted empty ephemeral room");
                }
                Err(e) => {
                    warn!(guild = %guild, channel = %before, error = %e,
                          "Remote delete failed, record kept for retry");
                }
            }
        } else if room.owner_id == member {
            let Some(new_owner) = select_owner(&remaining) else {
                return;
            };
            match self.db.rooms().update_owner(guild, before, new_owner).await {
                Ok(true) => {
                    metrics::ownership_transferred();
                    info!(guild = %guild, channel = %before,
                          old_owner = %member, new_owner = %new_owner,
                          "Transferred room ownership");
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(guild = %guild, channel = %before, error = %e,
                          "Failed to persist ownership transfer");
                }
            }
        }
    }

    /// Remove a room's registry record and its ban rows.
    pub(crate) async fn unregister_room(&self, guild: GuildId, channel: ChannelId) {
        match self.db.rooms().remove(guild, channel).await {
            Ok(true) => metrics::room_deleted(),
            Ok(false) => return,
            Err(e) => {
                warn!(guild = %guild, channel = %channel, error = %e,
                      "Failed to remove room record");
                return;
            }
        }

        if let Err(e) = self.db.bans().purge_channel(guild, channel).await {
            warn!(guild = %guild, channel = %channel, error = %e,
                  "Failed to purge ban rows for deleted room");
        }
    }
}

/// Replacement-owner rule: the remaining occupant with the lowest user id.
///
/// Deterministic and independent of the order the platform happens to list
/// occupants in. Callers filter the departing member out first.
pub(crate) fn select_owner(remaining: &[UserId]) -> Option<UserId> {
    remaining.iter().copied().min()
}

/// Deterministic room name from the owner's display name, fitting the
/// platform's channel-name cap.
fn room_name(display_name: Option<&str>, member: UserId) -> String {
    let name = match display_name {
        Some(name) if !name.trim().is_empty() => format!("{}'s room", name.trim()),
        _ => format!("room-{member}"),
    };
    truncate_chars(&name, MAX_CHANNEL_NAME_LEN)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
