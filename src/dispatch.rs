//! Per-guild serialization of events, commands and sweeps.
//!
//! Everything touching one guild's rooms flows through that guild's worker
//! task and is processed strictly in order, which is what makes the
//! controller's read-decide-act sequences safe without locks. Guilds do not
//! block each other. Workers are spawned on first use and respawned if their
//! queue ever closes.

use crate::controller::commands::{CommandEnvelope, CommandReply};
use crate::controller::{SessionController, VoiceEvent};
use crate::error::{CommandError, CommandResult};
use crate::ids::GuildId;
use crate::reconciler;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// Queue depth per guild worker. Full queues apply backpressure to the edge
/// rather than dropping membership events.
const JOB_QUEUE_DEPTH: usize = 128;

/// One unit of work for a guild worker.
enum GuildJob {
    Voice(VoiceEvent),
    Command {
        envelope: CommandEnvelope,
        reply_tx: oneshot::Sender<CommandResult<CommandReply>>,
    },
    Sweep,
}

/// Routes jobs to per-guild workers.
pub struct Dispatcher {
    controller: Arc<SessionController>,
    workers: DashMap<GuildId, mpsc::Sender<GuildJob>>,
}

impl Dispatcher {
    pub fn new(controller: Arc<SessionController>) -> Arc<Self> {
        Arc::new(Self {
            controller,
            workers: DashMap::new(),
        })
    }

    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    fn spawn_worker(&self, guild: GuildId) -> mpsc::Sender<GuildJob> {
        let (tx, rx) = mpsc::channel(JOB_QUEUE_DEPTH);
        let controller = Arc::clone(&self.controller);
        tokio::spawn(run_worker(controller, guild, rx));
        tx
    }

    /// The live sender for a guild's worker, spawning or respawning as
    /// needed. The map entry is held while spawning so two callers cannot
    /// race two workers into existence for the same guild.
    fn sender_for(&self, guild: GuildId) -> mpsc::Sender<GuildJob> {
        match self.workers.entry(guild) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_closed() {
                    let tx = self.spawn_worker(guild);
                    occupied.insert(tx.clone());
                    tx
                } else {
                    occupied.get().clone()
                }
            }
            Entry::Vacant(vacant) => {
                let tx = self.spawn_worker(guild);
                vacant.insert(tx.clone());
                tx
            }
        }
    }

    /// Enqueue a membership-change event. Awaits queue space, never replies.
    pub async fn submit_voice(&self, event: VoiceEvent) {
        let guild = event.guild_id;
        if self
            .sender_for(guild)
            .send(GuildJob::Voice(event))
            .await
            .is_err()
        {
            warn!(guild = %guild, "Guild worker queue closed, voice event dropped");
        }
    }

    /// Run a command on its guild's worker and wait for the reply.
    pub async fn command(&self, envelope: CommandEnvelope) -> CommandResult<CommandReply> {
        let guild = envelope.guild_id;
        let (reply_tx, reply_rx) = oneshot::channel();

        self.sender_for(guild)
            .send(GuildJob::Command { envelope, reply_tx })
            .await
            .map_err(|_| CommandError::Internal("guild worker queue closed".into()))?;

        reply_rx
            .await
            .map_err(|_| CommandError::Internal("guild worker dropped the command".into()))?
    }

    /// Enqueue a reconciler sweep for one guild.
    pub async fn enqueue_sweep(&self, guild: GuildId) {
        if self
            .sender_for(guild)
            .send(GuildJob::Sweep)
            .await
            .is_err()
        {
            warn!(guild = %guild, "Guild worker queue closed, sweep dropped");
        }
    }
}

async fn run_worker(
    controller: Arc<SessionController>,
    guild: GuildId,
    mut rx: mpsc::Receiver<GuildJob>,
) {
    while let Some(job) = rx.recv().await {
        match job {
            GuildJob::Voice(event) => {
                controller.handle_voice_event(&event).await;
            }
            GuildJob::Command { envelope, reply_tx } => {
                let result = controller.dispatch_command(&envelope).await;
                // The caller may have given up waiting; that is their business.
                let _ = reply_tx.send(result);
            }
            GuildJob::Sweep => {
                if let Err(e) = reconciler::reconcile_guild(&controller, guild).await {
                    warn!(guild = %guild, error = %e, "Sweep failed");
                }
            }
        }
    }
}
