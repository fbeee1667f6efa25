//! lobbyd — ephemeral voice-room controller.
//!
//! Watches membership-change events from a real-time chat platform and runs
//! the full lifecycle of "join to create" voice rooms:
//!
//! - a member entering a guild's lobby channel gets a private room spawned
//!   under the active category and becomes its owner;
//! - when the owner leaves a still-occupied room, ownership passes to the
//!   remaining occupant with the lowest user id;
//! - a room whose occupancy hits zero is deleted remotely and unregistered;
//! - owners manage their room (rename, limit, privacy, kick, ban, unban,
//!   invite) through a command surface gated on the persisted registry.
//!
//! Remote mutations and registry writes are never atomic with each other;
//! the reconciler sweeps the registry against remote reality and converges
//! the two. All work for one guild is serialized through one worker task.
//!
//! # Modules
//!
//! - [`config`] — TOML daemon configuration
//! - [`controller`] — event handling and the command layer
//! - [`db`] — SQLite-backed config/room/ban repositories
//! - [`dispatch`] — per-guild worker queues
//! - [`error`] — command error taxonomy
//! - [`http`] — axum edge (ingress, commands, health, metrics)
//! - [`ids`] — snowflake id newtypes
//! - [`metrics`] — Prometheus registry and helpers
//! - [`reconciler`] — drift-repair sweep
//! - [`remote`] — the platform room API trait, REST client and retry policy

pub mod config;
pub mod controller;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod ids;
pub mod metrics;
pub mod reconciler;
pub mod remote;
