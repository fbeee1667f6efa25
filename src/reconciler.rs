//! Drift repair between the room registry and remote reality.
//!
//! The event path and the registry are not transactional: a crash or a
//! failed remote call can leave a recorded room that no longer exists, an
//! empty room that was never deleted, or an owner who is no longer inside.
//! The sweep fixes all three. It is idempotent — running it twice in a row
//! changes nothing the second time — and per-guild sweeps are routed through
//! the same worker queue as events, so they never race the event path for
//! the same room.

use crate::controller::{SessionController, select_owner};
use crate::db::{Database, DbError};
use crate::dispatch::Dispatcher;
use crate::ids::GuildId;
use crate::metrics;
use crate::remote::RemoteError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What one sweep of a guild did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Room records examined.
    pub scanned: usize,
    /// Records removed (remote gone or remote emptied).
    pub removed: usize,
    /// Ownerships reassigned to a present occupant.
    pub transferred: usize,
}

/// Sweep one guild's room records against the remote.
///
/// Per room: a remote `NotFound` drops the record; an empty remote room is
/// deleted remotely first, then dropped; an occupied room whose recorded
/// owner has left gets a new owner by the standard rule. Probe or delete
/// failures leave the record for the next sweep.
pub async fn reconcile_guild(
    controller: &SessionController,
    guild: GuildId,
) -> Result<ReconcileReport, DbError> {
    metrics::reconciler_run();

    let rooms = controller.db().rooms().list(guild).await?;
    let mut report = ReconcileReport {
        scanned: rooms.len(),
        ..Default::default()
    };

    for room in rooms {
        let channel = room.channel_id;
        match controller.gateway().occupants(guild, channel).await {
            Err(RemoteError::NotFound(_)) => {
                controller.unregister_room(guild, channel).await;
                report.removed += 1;
                info!(guild = %guild, channel = %channel, "Dropped record for vanished room");
            }
            Err(e) => {
                warn!(guild = %guild, channel = %channel, error = %e,
                      "Occupancy probe failed, keeping record");
            }
            Ok(occupants) if occupants.is_empty() => {
                match controller.gateway().delete_channel(guild, channel).await {
                    Ok(()) | Err(RemoteError::NotFound(_)) => {
                        controller.unregister_room(guild, channel).await;
                        report.removed += 1;
                        info!(guild = %guild, channel = %channel, "Deleted empty room during sweep");
                    }
                    Err(e) => {
                        warn!(guild = %guild, channel = %channel, error = %e,
                              "Remote delete failed during sweep, record kept");
                    }
                }
            }
            Ok(occupants) => {
                if !occupants.contains(&room.owner_id)
                    && let Some(new_owner) = select_owner(&occupants)
                {
                    match controller
                        .db()
                        .rooms()
                        .update_owner(guild, channel, new_owner)
                        .await
                    {
                        Ok(true) => {
                            report.transferred += 1;
                            metrics::ownership_transferred();
                            info!(guild = %guild, channel = %channel,
                                  old_owner = %room.owner_id, new_owner = %new_owner,
                                  "Healed absent ownership during sweep");
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!(guild = %guild, channel = %channel, error = %e,
                                  "Failed to persist healed ownership");
                        }
                    }
                }
            }
        }
    }

    metrics::reconciler_removed(report.removed as u64);
    Ok(report)
}

/// Spawn the periodic sweep task. Each tick enqueues a sweep job on every
/// guild that has tracked rooms; the guild workers serialize the sweep
/// against that guild's events.
pub fn spawn_periodic(db: Database, dispatcher: Arc<Dispatcher>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;

            let guilds = match db.rooms().guilds().await {
                Ok(guilds) => guilds,
                Err(e) => {
                    warn!(error = %e, "Failed to enumerate guilds for sweep");
                    continue;
                }
            };

            for guild in guilds {
                dispatcher.enqueue_sweep(guild).await;
            }
        }
    });
}
