//! Rooms and their single-consumer dispatch loops.
//!
//! Every room owns its membership. All mutations happen on the consumer task
//! draining the bounded inbound queue, so joins, leaves, and messages within
//! one room are serialized. Responses are collected under the members lock
//! and enqueued onto the target chatters only after it is released.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::error::ManagerError;
use crate::proto::{ChatRequest, ChatResponse, ReqType, RspType};
use crate::state::chatter::Chatter;
use crate::state::stats::{RoomMemberStats, RoomStats, TrafficCounters};
use crate::state::uid::ChatterId;

/// Join content that marks the member hidden from listings.
const HIDDEN_FLAG: &str = "hidden";

/// A request tagged with the chatter that issued it.
#[derive(Debug, Clone)]
pub struct RoomRequest {
    pub who: Arc<Chatter>,
    pub req: ChatRequest,
}

/// Membership entry: the chatter handle plus its hidden flag.
#[derive(Debug, Clone)]
struct Member {
    chatter: Arc<Chatter>,
    hidden: bool,
}

/// Responses produced by one dispatch, delivered after the lock drops.
type Outbox = Vec<(Arc<Chatter>, ChatResponse)>;

/// A named multicast group of chatters.
#[derive(Debug)]
pub struct Room {
    name: RwLock<String>,
    members: RwLock<HashMap<ChatterId, Member>>,
    counters: Mutex<TrafficCounters>,
}

/// Clonable handle to a live room: the shared state plus the inbound queue.
///
/// Dropping the last handle closes the queue, which terminates the consumer.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    room: Arc<Room>,
    inbound: mpsc::Sender<RoomRequest>,
}

impl RoomHandle {
    /// Non-blocking enqueue onto the room's inbound queue.
    ///
    /// A full or closed queue drops the request and the sender receives no
    /// response; this is the backpressure policy.
    pub fn submit(&self, req: RoomRequest) {
        if let Err(err) = self.inbound.try_send(req) {
            match err {
                TrySendError::Full(req) => {
                    debug!(chatter = %req.who.id(), "room inbound queue full, request dropped");
                }
                TrySendError::Closed(_) => {}
            }
        }
    }

    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }
}

impl Room {
    /// Create the room and start its consumer with the given mailbox
    /// capacity. The consumer exits when the inbound queue closes or the
    /// shutdown signal fires.
    pub(crate) fn spawn(
        name: String,
        capacity: usize,
        shutdown: broadcast::Receiver<()>,
        tracker: &TaskTracker,
    ) -> RoomHandle {
        let (tx, rx) = mpsc::channel(capacity);
        let room = Arc::new(Self {
            name: RwLock::new(name),
            members: RwLock::new(HashMap::new()),
            counters: Mutex::new(TrafficCounters::new()),
        });
        tracker.spawn(Arc::clone(&room).run(rx, shutdown));
        RoomHandle { room, inbound: tx }
    }

    /// The consumer loop. Sole mutator of `members`.
    async fn run(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<RoomRequest>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    let room_name = self.name().await;
                    info!(room = %room_name, "room consumer stopping");
                    break;
                }
                req = rx.recv() => {
                    let Some(req) = req else { break };
                    // A panicking dispatch must not take the room down with it.
                    let dispatched = AssertUnwindSafe(self.dispatch(req)).catch_unwind().await;
                    if dispatched.is_err() {
                        let room_name = self.name().await;
                        error!(room = %room_name, "request dispatch panicked, continuing");
                    }
                }
            }
        }
    }

    pub async fn name(&self) -> String {
        self.name.read().await.clone()
    }

    /// Rename the room. Only an empty room may be renamed.
    pub(crate) async fn set_name(&self, name: &str) -> Result<(), ManagerError> {
        let mut current = self.name.write().await;
        if !self.members.read().await.is_empty() {
            return Err(ManagerError::RoomNotEmpty(current.clone()));
        }
        *current = name.to_string();
        Ok(())
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    pub async fn is_member(&self, id: ChatterId) -> bool {
        self.members.read().await.contains_key(&id)
    }

    pub async fn stats_snapshot(&self) -> RoomStats {
        let counters = self.counters.lock().await.clone();
        let mut member_stats = Vec::new();
        {
            let members = self.members.read().await;
            for member in members.values() {
                member_stats.push(RoomMemberStats {
                    nickname: member.chatter.nickname().await,
                    remote_addr: member.chatter.remote_addr().to_string(),
                    hidden: member.hidden,
                });
            }
        }
        member_stats.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        RoomStats {
            name: self.name().await,
            start: counters.start,
            last_req: counters.last_req,
            last_rsp: counters.last_rsp,
            req_count: counters.req_count,
            rsp_count: counters.rsp_count,
            members: member_stats,
        }
    }

    async fn dispatch(&self, req: RoomRequest) {
        self.counters.lock().await.touch_req();
        let RoomRequest { who, req } = req;
        let room_name = self.name().await;
        debug!(room = %room_name, chatter = %who.id(), req = ?req.req_type, "room request");

        let outbox = match req.req_type {
            ReqType::ListNames => self.list_names(&who).await,
            ReqType::Join => self.join(&who, &req.content).await,
            ReqType::Hide => self.set_hidden(&who, true).await,
            ReqType::Unhide => self.set_hidden(&who, false).await,
            ReqType::Message => self.message(&who, &req.content).await,
            ReqType::Leave => self.leave(&who).await,
            // Chatter-local codes never reach a room; treat them, and any
            // unrecognized code, as unknown.
            ReqType::SetNickname
            | ReqType::GetNickname
            | ReqType::ListRooms
            | ReqType::Unknown(_) => {
                let name = self.name().await;
                vec![(
                    Arc::clone(&who),
                    ChatResponse::new(
                        &name,
                        RspType::ErrUnknownReq,
                        format!("Unknown request sent to room \"{name}\"."),
                        Vec::new(),
                    ),
                )]
            }
        };
        self.deliver(outbox).await;
    }

    async fn deliver(&self, outbox: Outbox) {
        if outbox.is_empty() {
            return;
        }
        {
            let mut counters = self.counters.lock().await;
            for _ in &outbox {
                counters.touch_rsp();
            }
        }
        for (chatter, rsp) in outbox {
            chatter.enqueue(rsp);
        }
    }

    async fn list_names(&self, who: &Arc<Chatter>) -> Outbox {
        let name = self.name().await;
        let members = self.members.read().await;
        let list = visible_names(&members).await;
        vec![(
            Arc::clone(who),
            ChatResponse::new(&name, RspType::ListNames, "", list),
        )]
    }

    async fn join(&self, who: &Arc<Chatter>, content: &str) -> Outbox {
        let name = self.name().await;
        let nick = who.nickname().await;
        let mut members = self.members.write().await;

        if members.contains_key(&who.id()) {
            return vec![(
                Arc::clone(who),
                ChatResponse::new(
                    &name,
                    RspType::ErrAlreadyJoined,
                    format!("You are already a member of room \"{name}\"."),
                    Vec::new(),
                ),
            )];
        }
        if nick.is_empty() {
            return vec![(
                Arc::clone(who),
                ChatResponse::new(
                    &name,
                    RspType::ErrNicknameMandatory,
                    "You must have a nickname to join a room.",
                    Vec::new(),
                ),
            )];
        }
        for member in members.values() {
            if member.chatter.nickname().await == nick {
                return vec![(
                    Arc::clone(who),
                    ChatResponse::new(
                        &name,
                        RspType::ErrNicknameUsed,
                        format!("Nickname \"{nick}\" is already in use in room \"{name}\"."),
                        Vec::new(),
                    ),
                )];
            }
        }

        let hidden = content == HIDDEN_FLAG;
        members.insert(
            who.id(),
            Member {
                chatter: Arc::clone(who),
                hidden,
            },
        );
        let list = visible_names(&members).await;
        let content = format!("{nick} has joined the room.");
        members
            .values()
            .map(|member| {
                (
                    Arc::clone(&member.chatter),
                    ChatResponse::new(&name, RspType::Join, content.clone(), list.clone()),
                )
            })
            .collect()
    }

    async fn set_hidden(&self, who: &Arc<Chatter>, hidden: bool) -> Outbox {
        let name = self.name().await;
        let mut members = self.members.write().await;
        let Some(member) = members.get_mut(&who.id()) else {
            return not_in_room(who, &name);
        };
        member.hidden = hidden;
        let (rsp_type, content) = if hidden {
            (
                RspType::Hide,
                format!("You are now hidden in room \"{name}\"."),
            )
        } else {
            (
                RspType::Unhide,
                format!("You are now unhidden in room \"{name}\"."),
            )
        };
        vec![(
            Arc::clone(who),
            ChatResponse::new(&name, rsp_type, content, Vec::new()),
        )]
    }

    async fn message(&self, who: &Arc<Chatter>, body: &str) -> Outbox {
        let name = self.name().await;
        let members = self.members.read().await;
        match members.get(&who.id()) {
            None => not_in_room(who, &name),
            Some(member) if member.hidden => vec![(
                Arc::clone(who),
                ChatResponse::new(
                    &name,
                    RspType::ErrHiddenNickname,
                    format!("You cannot send messages while hidden in room \"{name}\"."),
                    Vec::new(),
                ),
            )],
            Some(_) => {
                let nick = who.nickname().await;
                let content = format!("{nick}: {body}");
                members
                    .values()
                    .map(|member| {
                        (
                            Arc::clone(&member.chatter),
                            ChatResponse::new(&name, RspType::Message, content.clone(), Vec::new()),
                        )
                    })
                    .collect()
            }
        }
    }

    async fn leave(&self, who: &Arc<Chatter>) -> Outbox {
        let name = self.name().await;
        let mut members = self.members.write().await;
        // Leaving a room you never joined is a silent no-op.
        let Some(member) = members.remove(&who.id()) else {
            return Vec::new();
        };
        let nick = member.chatter.nickname().await;
        let list = visible_names(&members).await;
        let mut outbox: Outbox = vec![(
            Arc::clone(who),
            ChatResponse::new(
                &name,
                RspType::Leave,
                format!("You have left room \"{name}\"."),
                Vec::new(),
            ),
        )];
        let content = format!("{nick} has left the room.");
        for member in members.values() {
            outbox.push((
                Arc::clone(&member.chatter),
                ChatResponse::new(&name, RspType::Leave, content.clone(), list.clone()),
            ));
        }
        outbox
    }
}

/// Nicknames of all non-hidden members, sorted for deterministic listings.
async fn visible_names(members: &HashMap<ChatterId, Member>) -> Vec<String> {
    let mut names = Vec::new();
    for member in members.values() {
        if !member.hidden {
            names.push(member.chatter.nickname().await);
        }
    }
    names.sort();
    names
}

fn not_in_room(who: &Arc<Chatter>, name: &str) -> Outbox {
    vec![(
        Arc::clone(who),
        ChatResponse::new(
            name,
            RspType::ErrNotInRoom,
            format!("You are not a member of room \"{name}\"."),
            Vec::new(),
        ),
    )]
}
