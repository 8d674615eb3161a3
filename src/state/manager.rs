//! The process-wide registry and lifecycle coordinator.
//!
//! The manager owns room and chatter lifetimes. Rooms and connection
//! sessions hold it only through narrow capabilities (`submit`, lookups,
//! `unregister_chatter`), never the other way around.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::config::Config;
use crate::error::ManagerError;
use crate::proto::{ChatRequest, ChatResponse, ReqType};
use crate::state::chatter::Chatter;
use crate::state::room::{Room, RoomHandle, RoomRequest};
use crate::state::stats::{ChatterStats, RoomStats};
use crate::state::uid::{ChatterId, ChatterIdGenerator};

pub struct ChatManager {
    /// Live rooms by name. Guarded by a readers-writer lock so
    /// `find_or_create` can re-check under the exclusive lock.
    rooms: RwLock<HashMap<String, RoomHandle>>,
    /// Live chatters by id.
    chatters: DashMap<ChatterId, Arc<Chatter>>,
    ids: ChatterIdGenerator,
    max_rooms: usize,
    max_idle_secs: u64,
    room_queue_depth: usize,
    chatter_queue_depth: usize,
    /// Global done signal; every long-running loop selects on a subscription.
    shutdown_tx: broadcast::Sender<()>,
    /// Tracks room consumers and connection sessions for shutdown.
    tracker: TaskTracker,
}

impl ChatManager {
    pub fn new(config: &Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            rooms: RwLock::new(HashMap::new()),
            chatters: DashMap::new(),
            ids: ChatterIdGenerator::default(),
            max_rooms: config.limits.max_rooms,
            max_idle_secs: config.limits.max_idle_secs,
            room_queue_depth: config.limits.room_queue_depth,
            chatter_queue_depth: config.limits.chatter_queue_depth,
            shutdown_tx,
            tracker: TaskTracker::new(),
        }
    }

    pub fn max_idle_secs(&self) -> u64 {
        self.max_idle_secs
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Allocate a chatter bound to this connection and insert it into the
    /// live set. Returns the handle plus the receiving end of its outbound
    /// queue, which the connection's writer loop owns. Always succeeds.
    pub fn register_chatter(
        &self,
        remote_addr: String,
    ) -> (Arc<Chatter>, mpsc::Receiver<ChatResponse>) {
        let (tx, rx) = mpsc::channel(self.chatter_queue_depth);
        let chatter = Arc::new(Chatter::new(self.ids.next(), remote_addr, tx));
        self.chatters.insert(chatter.id(), Arc::clone(&chatter));
        (chatter, rx)
    }

    /// Remove the chatter from the live set; idempotent.
    pub fn unregister_chatter(&self, id: ChatterId) {
        self.chatters.remove(&id);
    }

    /// Pure lookup.
    pub async fn find(&self, name: &str) -> Result<RoomHandle, ManagerError> {
        self.rooms
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ManagerError::RoomNotFound(name.to_string()))
    }

    /// Return the room for `name`, creating it if missing and under quota.
    ///
    /// Check-lock-check: a shared-lock read first, then a re-check under the
    /// exclusive lock, so concurrent callers agree on one room and no orphan
    /// consumer is ever spawned. Creation is the only place the quota is
    /// enforced.
    pub async fn find_or_create(&self, name: &str) -> Result<RoomHandle, ManagerError> {
        if let Some(handle) = self.rooms.read().await.get(name) {
            return Ok(handle.clone());
        }
        let mut rooms = self.rooms.write().await;
        if let Some(handle) = rooms.get(name) {
            return Ok(handle.clone());
        }
        if self.max_rooms > 0 && rooms.len() == self.max_rooms {
            return Err(ManagerError::MaxRoomsReached);
        }
        let handle = Room::spawn(
            name.to_string(),
            self.room_queue_depth,
            self.shutdown_tx.subscribe(),
            &self.tracker,
        );
        rooms.insert(name.to_string(), handle.clone());
        info!(room = name, "room created");
        Ok(handle)
    }

    /// Snapshot of current room names.
    pub async fn list_room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Rename a room. Only an empty room may be renamed, and the new name
    /// must be free.
    pub async fn rename_room(&self, from: &str, to: &str) -> Result<(), ManagerError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(to) {
            return Err(ManagerError::RoomAlreadyExists(to.to_string()));
        }
        let Some(handle) = rooms.remove(from) else {
            return Err(ManagerError::RoomNotFound(from.to_string()));
        };
        if let Err(err) = handle.room().set_name(to).await {
            rooms.insert(from.to_string(), handle);
            return Err(err);
        }
        rooms.insert(to.to_string(), handle);
        Ok(())
    }

    /// Delete an empty room. Dropping its handle closes the inbound queue,
    /// which terminates the consumer.
    pub async fn delete_room(&self, name: &str) -> Result<(), ManagerError> {
        let mut rooms = self.rooms.write().await;
        let Some(handle) = rooms.get(name) else {
            return Err(ManagerError::RoomNotFound(name.to_string()));
        };
        if !handle.room().is_empty().await {
            return Err(ManagerError::RoomNotEmpty(name.to_string()));
        }
        rooms.remove(name);
        Ok(())
    }

    /// Best-effort broadcast: enqueue a Leave on every currently known
    /// room's inbound queue. Full or closed queues are silently skipped.
    pub async fn remove_chatter_from_all_rooms(&self, chatter: &Arc<Chatter>) {
        let rooms: Vec<(String, RoomHandle)> = self
            .rooms
            .read()
            .await
            .iter()
            .map(|(name, handle)| (name.clone(), handle.clone()))
            .collect();
        for (name, handle) in rooms {
            handle.submit(RoomRequest {
                who: Arc::clone(chatter),
                req: ChatRequest {
                    room_name: name,
                    req_type: ReqType::Leave,
                    content: String::new(),
                },
            });
        }
    }

    /// Snapshot of per-room statistics for the stats endpoint.
    pub async fn list_room_stats(&self) -> Vec<RoomStats> {
        let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();
        let mut stats = Vec::with_capacity(handles.len());
        for handle in handles {
            stats.push(handle.room().stats_snapshot().await);
        }
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Snapshot of per-chatter statistics for the stats endpoint.
    pub async fn list_chatter_stats(&self) -> Vec<ChatterStats> {
        let chatters: Vec<Arc<Chatter>> = self
            .chatters
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut stats = Vec::with_capacity(chatters.len());
        for chatter in chatters {
            stats.push(chatter.stats_snapshot().await);
        }
        stats.sort_by(|a, b| a.remote_addr.cmp(&b.remote_addr));
        stats
    }

    /// Fire the global done signal without waiting for anything.
    pub fn begin_shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Fire the done signal, wait for every room consumer and connection
    /// session to finish, then clear the registries.
    pub async fn shutdown(&self) {
        self.begin_shutdown();
        self.tracker.close();
        self.tracker.wait().await;
        self.rooms.write().await.clear();
        self.chatters.clear();
        info!("chat manager stopped");
    }
}
