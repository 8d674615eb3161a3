//! chatterd - a multi-room chat server over WebSocket.
//!
//! Clients connect at `/v1.0/chat`, pick a nickname, join rooms, and
//! exchange JSON request/response frames; `/v1.0/alive` and `/v1.0/stats`
//! expose liveness and introspection over plain HTTP.
//!
//! Three actor populations cooperate: the [`state::ChatManager`] registry,
//! one consumer task per [`state::Room`], and a reader/writer loop pair per
//! connected [`state::Chatter`]. Rooms serialize all membership mutations
//! through their single consumer; chatters serialize all socket writes
//! through their single writer; the manager's shutdown broadcast tears every
//! loop down in parallel.

pub mod config;
pub mod error;
pub mod http;
pub mod network;
pub mod proto;
pub mod state;

pub use config::Config;
pub use error::ManagerError;
pub use http::AppContext;
pub use network::Gateway;
pub use state::ChatManager;
