//! Integration test common infrastructure.
//!
//! Provides an in-memory database, a scripted fake of the platform room API,
//! and helpers for driving the controller the way the real edge would.

// Each integration test binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use async_trait::async_trait;
use lobbyd::controller::commands::{CommandEnvelope, CommandRequest};
use lobbyd::controller::{SessionController, VoiceEvent};
use lobbyd::db::{Database, GuildConfigRecord};
use lobbyd::ids::{ChannelId, GuildId, UserId};
use lobbyd::remote::{RemoteError, RemoteResult, RoomGateway};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// A channel living inside the fake platform.
#[derive(Debug, Clone)]
pub struct FakeChannel {
    pub guild: GuildId,
    pub kind: &'static str,
    pub name: String,
    pub parent: Option<ChannelId>,
    pub user_limit: Option<u16>,
    pub everyone_connect: Option<bool>,
    pub denied: HashSet<UserId>,
    pub messages: Vec<String>,
    pub invites: Vec<(u32, u16)>,
}

#[derive(Default)]
struct FakeState {
    next_id: i64,
    channels: HashMap<ChannelId, FakeChannel>,
    voice: HashMap<(GuildId, UserId), ChannelId>,
    fail_next: HashMap<&'static str, VecDeque<RemoteError>>,
    calls: Vec<String>,
}

/// Scripted in-memory stand-in for the platform's room API.
///
/// Tracks channels and voice connections, logs every call, and can be told
/// to fail specific operations. `occupants` reports members in descending id
/// order on purpose: any code that grabs "the first occupant" instead of
/// applying the lowest-id rule gets caught.
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_id: 1000,
                ..Default::default()
            }),
        }
    }

    /// Queue a failure for the next call of the named operation.
    pub fn fail_next(&self, op: &'static str, error: RemoteError) {
        self.state
            .lock()
            .unwrap()
            .fail_next
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Put a member into a voice channel (or out of voice), as the platform
    /// UI would, without going through the gateway surface.
    pub fn place(&self, guild: GuildId, user: UserId, channel: Option<ChannelId>) {
        let mut state = self.state.lock().unwrap();
        match channel {
            Some(c) => {
                state.voice.insert((guild, user), c);
            }
            None => {
                state.voice.remove(&(guild, user));
            }
        }
    }

    /// Drop a channel behind the controller's back (remote-side drift).
    pub fn vanish_channel(&self, channel: ChannelId) {
        let mut state = self.state.lock().unwrap();
        state.channels.remove(&channel);
        state.voice.retain(|_, c| *c != channel);
    }

    pub fn channel(&self, channel: ChannelId) -> Option<FakeChannel> {
        self.state.lock().unwrap().channels.get(&channel).cloned()
    }

    pub fn channel_count(&self) -> usize {
        self.state.lock().unwrap().channels.len()
    }

    pub fn voice_channel_of(&self, guild: GuildId, user: UserId) -> Option<ChannelId> {
        self.state.lock().unwrap().voice.get(&(guild, user)).copied()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn begin(&self, op: &'static str, detail: String) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{op} {detail}"));
        if let Some(queue) = state.fail_next.get_mut(op)
            && let Some(error) = queue.pop_front()
        {
            return Err(error);
        }
        Ok(())
    }

    fn create(
        &self,
        guild: GuildId,
        kind: &'static str,
        name: &str,
        parent: Option<ChannelId>,
    ) -> ChannelId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = ChannelId(state.next_id);
        state.channels.insert(
            id,
            FakeChannel {
                guild,
                kind,
                name: name.to_string(),
                parent,
                user_limit: None,
                everyone_connect: None,
                denied: HashSet::new(),
                messages: Vec::new(),
                invites: Vec::new(),
            },
        );
        id
    }
}

#[async_trait]
impl RoomGateway for FakeGateway {
    async fn create_voice_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
    ) -> RemoteResult<ChannelId> {
        self.begin("create_voice_channel", name.to_string())?;
        Ok(self.create(guild, "voice", name, parent))
    }

    async fn create_category(&self, guild: GuildId, name: &str) -> RemoteResult<ChannelId> {
        self.begin("create_category", name.to_string())?;
        Ok(self.create(guild, "category", name, None))
    }

    async fn create_text_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
    ) -> RemoteResult<ChannelId> {
        self.begin("create_text_channel", name.to_string())?;
        Ok(self.create(guild, "text", name, parent))
    }

    async fn delete_channel(&self, _guild: GuildId, channel: ChannelId) -> RemoteResult<()> {
        self.begin("delete_channel", channel.to_string())?;
        let mut state = self.state.lock().unwrap();
        if state.channels.remove(&channel).is_none() {
            return Err(RemoteError::NotFound(format!("channels/{channel}")));
        }
        state.voice.retain(|_, c| *c != channel);
        Ok(())
    }

    async fn move_member(
        &self,
        guild: GuildId,
        member: UserId,
        to: Option<ChannelId>,
    ) -> RemoteResult<()> {
        self.begin("move_member", format!("{member} -> {to:?}"))?;
        let mut state = self.state.lock().unwrap();
        match to {
            Some(c) => {
                if !state.channels.contains_key(&c) {
                    return Err(RemoteError::NotFound(format!("channels/{c}")));
                }
                state.voice.insert((guild, member), c);
            }
            None => {
                state.voice.remove(&(guild, member));
            }
        }
        Ok(())
    }

    async fn set_connect_permission(
        &self,
        _guild: GuildId,
        channel: ChannelId,
        member: UserId,
        allowed: bool,
    ) -> RemoteResult<()> {
        self.begin("set_connect_permission", format!("{channel}/{member}={allowed}"))?;
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.channels.get_mut(&channel) else {
            return Err(RemoteError::NotFound(format!("channels/{channel}")));
        };
        if allowed {
            entry.denied.remove(&member);
        } else {
            entry.denied.insert(member);
        }
        Ok(())
    }

    async fn set_everyone_connect(
        &self,
        _guild: GuildId,
        channel: ChannelId,
        allowed: bool,
    ) -> RemoteResult<()> {
        self.begin("set_everyone_connect", format!("{channel}={allowed}"))?;
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.channels.get_mut(&channel) else {
            return Err(RemoteError::NotFound(format!("channels/{channel}")));
        };
        entry.everyone_connect = Some(allowed);
        Ok(())
    }

    async fn rename_channel(
        &self,
        _guild: GuildId,
        channel: ChannelId,
        name: &str,
    ) -> RemoteResult<()> {
        self.begin("rename_channel", format!("{channel} -> {name}"))?;
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.channels.get_mut(&channel) else {
            return Err(RemoteError::NotFound(format!("channels/{channel}")));
        };
        entry.name = name.to_string();
        Ok(())
    }

    async fn set_user_limit(
        &self,
        _guild: GuildId,
        channel: ChannelId,
        limit: u16,
    ) -> RemoteResult<()> {
        self.begin("set_user_limit", format!("{channel}={limit}"))?;
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.channels.get_mut(&channel) else {
            return Err(RemoteError::NotFound(format!("channels/{channel}")));
        };
        entry.user_limit = Some(limit);
        Ok(())
    }

    async fn create_invite(
        &self,
        _guild: GuildId,
        channel: ChannelId,
        max_age_secs: u32,
        max_uses: u16,
    ) -> RemoteResult<String> {
        self.begin("create_invite", channel.to_string())?;
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.channels.get_mut(&channel) else {
            return Err(RemoteError::NotFound(format!("channels/{channel}")));
        };
        entry.invites.push((max_age_secs, max_uses));
        Ok(format!("https://invite.test/{channel}"))
    }

    async fn post_message(
        &self,
        _guild: GuildId,
        channel: ChannelId,
        text: &str,
    ) -> RemoteResult<()> {
        self.begin("post_message", channel.to_string())?;
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.channels.get_mut(&channel) else {
            return Err(RemoteError::NotFound(format!("channels/{channel}")));
        };
        entry.messages.push(text.to_string());
        Ok(())
    }

    async fn occupants(&self, guild: GuildId, channel: ChannelId) -> RemoteResult<Vec<UserId>> {
        self.begin("occupants", channel.to_string())?;
        let state = self.state.lock().unwrap();
        if !state.channels.contains_key(&channel) {
            return Err(RemoteError::NotFound(format!("channels/{channel}")));
        }
        let mut members: Vec<UserId> = state
            .voice
            .iter()
            .filter(|((g, _), c)| *g == guild && **c == channel)
            .map(|((_, u), _)| *u)
            .collect();
        // Descending on purpose: exposes any "first occupant" assumption.
        members.sort_by(|a, b| b.cmp(a));
        Ok(members)
    }

    async fn current_channel(
        &self,
        guild: GuildId,
        member: UserId,
    ) -> RemoteResult<Option<ChannelId>> {
        self.begin("current_channel", member.to_string())?;
        Ok(self.state.lock().unwrap().voice.get(&(guild, member)).copied())
    }
}

/// Controller + fake platform + in-memory registry.
pub struct Harness {
    pub db: Database,
    pub fake: Arc<FakeGateway>,
    pub controller: Arc<SessionController>,
}

pub async fn harness() -> Harness {
    let db = Database::new(":memory:").await.expect("in-memory db");
    let fake = Arc::new(FakeGateway::new());
    let gateway: Arc<dyn RoomGateway> = fake.clone();
    let controller = Arc::new(SessionController::new(db.clone(), gateway));
    Harness {
        db,
        fake,
        controller,
    }
}

pub fn admin(guild: GuildId, actor: UserId, command: CommandRequest) -> CommandEnvelope {
    CommandEnvelope {
        guild_id: guild,
        actor_id: actor,
        actor_is_admin: true,
        command,
    }
}

pub fn member(guild: GuildId, actor: UserId, command: CommandRequest) -> CommandEnvelope {
    CommandEnvelope {
        guild_id: guild,
        actor_id: actor,
        actor_is_admin: false,
        command,
    }
}

/// Run `setup` as an admin and return the persisted config.
pub async fn setup_guild(h: &Harness, guild: GuildId) -> GuildConfigRecord {
    h.controller
        .dispatch_command(&admin(guild, UserId(1), CommandRequest::Setup))
        .await
        .expect("setup");
    h.db
        .configs()
        .get(guild)
        .await
        .expect("config query")
        .expect("config present after setup")
}

/// Simulate a member's voice transition: the platform applies the move, then
/// the controller sees the event.
pub async fn voice_move(
    h: &Harness,
    guild: GuildId,
    user: UserId,
    display: &str,
    from: Option<ChannelId>,
    to: Option<ChannelId>,
) {
    h.fake.place(guild, user, to);
    h.controller
        .handle_voice_event(&VoiceEvent {
            guild_id: guild,
            member_id: user,
            member_display_name: Some(display.to_string()),
            before_channel_id: from,
            after_channel_id: to,
        })
        .await;
}
