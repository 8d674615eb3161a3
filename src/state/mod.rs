//! Server state: the manager registry, rooms, and chatters.

mod chatter;
mod manager;
mod room;
mod stats;
mod uid;

pub use chatter::Chatter;
pub use manager::ChatManager;
pub use room::{Room, RoomHandle, RoomRequest};
pub use stats::{ChatterStats, RoomMemberStats, RoomStats};
pub use uid::{ChatterId, ChatterIdGenerator};
