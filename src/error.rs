//! Unified error handling for lobbyd.
//!
//! Command failures carry an `error_code()` for metrics labeling and a
//! `user_message()` for the ephemeral reply shown to the member who issued
//! the command. Remote and database failures are deliberately rendered as a
//! generic message; the detail goes to the log, not to the member.

use crate::db::DbError;
use crate::remote::RemoteError;
use thiserror::Error;

/// Errors that can occur while executing a room command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),

    #[error("not in a managed room")]
    NotInRoom,

    #[error("not the room owner")]
    NotOwner,

    #[error("missing privileges")]
    MissingPrivileges,

    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CommandError {
    /// Static error code for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotInRoom => "not_in_room",
            Self::NotOwner => "not_owner",
            Self::MissingPrivileges => "missing_privileges",
            Self::Remote(e) => e.error_code(),
            Self::Db(_) => "persistence",
            Self::Internal(_) => "internal",
        }
    }

    /// The ephemeral reply text for the member who issued the command.
    ///
    /// Validation and authorization failures explain themselves; remote and
    /// internal failures get a generic message so platform details never
    /// leak into chat.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::NotInRoom => "You are not in a voice room managed by this server.".to_string(),
            Self::NotOwner => "Only the room owner can use this command.".to_string(),
            Self::MissingPrivileges => {
                "You do not have permission to use this command.".to_string()
            }
            Self::Remote(_) | Self::Db(_) | Self::Internal(_) => {
                "Something went wrong. Please try again shortly.".to_string()
            }
        }
    }
}

/// Result type for command handlers.
pub type CommandResult<T> = Result<T, CommandError>;
