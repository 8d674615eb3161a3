//! Error types for the room registry.

use crate::proto::{ChatResponse, RspType};
use thiserror::Error;

/// Errors surfaced by manager operations on the room registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    #[error("chat room \"{0}\" not found")]
    RoomNotFound(String),

    #[error("chat room \"{0}\" already exists")]
    RoomAlreadyExists(String),

    #[error("chat room \"{0}\" is not empty")]
    RoomNotEmpty(String),

    #[error("maximum number of rooms reached")]
    MaxRoomsReached,
}

impl ManagerError {
    /// Convert to a wire error response.
    ///
    /// Returns `None` for errors with no wire protocol (rename/delete are
    /// library-only operations).
    pub fn to_response(&self) -> Option<ChatResponse> {
        match self {
            Self::MaxRoomsReached => Some(ChatResponse::new(
                "",
                RspType::ErrMaxRoomsReached,
                "Maximum number of rooms reached. Cannot create new room.",
                Vec::new(),
            )),
            Self::RoomNotFound(_) | Self::RoomAlreadyExists(_) | Self::RoomNotEmpty(_) => None,
        }
    }
}
