//! One WebSocket session: upgrade, reader loop, writer task, teardown.
//!
//! Ownership per connection:
//!   - the reader loop solely owns the stream half of the socket,
//!   - the writer task solely owns the sink half,
//!   - rooms reach the client only through the chatter's outbound queue.
//!
//! Both loops select on the manager's shutdown broadcast and on the
//! chatter's own done signal, so teardown never depends on the peer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::http::AppContext;
use crate::proto::{ChatRequest, ChatResponse, ReqType, RspType};
use crate::state::{Chatter, RoomRequest};

/// `GET /v1.0/chat` - upgrade to the chat protocol.
///
/// The connection cap is checked before the upgrade completes; a saturated
/// server refuses with 503.
pub(crate) async fn chat_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(ctx): State<Arc<AppContext>>,
) -> Response {
    let Some(permit) = ctx.limiter.try_acquire() else {
        warn!(%addr, "connection refused, connection cap reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    let tracker = ctx.manager.tracker().clone();
    ws.on_upgrade(move |socket| {
        tracker.track_future(async move {
            session(socket, addr, ctx).await;
            drop(permit);
        })
    })
}

/// Drive one connection from upgrade to teardown.
async fn session(socket: WebSocket, addr: SocketAddr, ctx: Arc<AppContext>) {
    let (chatter, outbound_rx) = ctx.manager.register_chatter(addr.to_string());
    info!(chatter = %chatter.id(), %addr, "client connected");

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_loop(
        Arc::clone(&chatter),
        outbound_rx,
        sink,
        ctx.manager.subscribe_shutdown(),
    ));

    read_loop(&chatter, stream, &ctx, ctx.manager.subscribe_shutdown()).await;

    // Teardown: fire the chatter's done signal, let the writer wind down,
    // then detach from every room and the registry.
    chatter.done().cancel();
    let _ = writer.await;
    ctx.manager.remove_chatter_from_all_rooms(&chatter).await;
    ctx.manager.unregister_chatter(chatter.id());
    info!(chatter = %chatter.id(), %addr, "session closed");
}

enum ReadEvent {
    Frame(Result<Message, axum::Error>),
    Ended,
    TimedOut,
}

/// Read the next frame, applying the per-read idle deadline when configured.
async fn next_frame(stream: &mut SplitStream<WebSocket>, max_idle_secs: u64) -> ReadEvent {
    if max_idle_secs > 0 {
        match timeout(Duration::from_secs(max_idle_secs), stream.next()).await {
            Err(_) => ReadEvent::TimedOut,
            Ok(None) => ReadEvent::Ended,
            Ok(Some(frame)) => ReadEvent::Frame(frame),
        }
    } else {
        match stream.next().await {
            None => ReadEvent::Ended,
            Some(frame) => ReadEvent::Frame(frame),
        }
    }
}

/// The reader loop: decode frames and route requests until the peer goes
/// away, the idle deadline fires, or a shutdown signal arrives.
async fn read_loop(
    chatter: &Arc<Chatter>,
    mut stream: SplitStream<WebSocket>,
    ctx: &Arc<AppContext>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let max_idle_secs = ctx.manager.max_idle_secs();
    loop {
        let event = tokio::select! {
            _ = shutdown.recv() => break,
            _ = chatter.done().cancelled() => break,
            event = next_frame(&mut stream, max_idle_secs) => event,
        };
        match event {
            ReadEvent::TimedOut => {
                info!(chatter = %chatter.id(), "client forced to disconnect due to inactivity");
                break;
            }
            ReadEvent::Ended => {
                info!(chatter = %chatter.id(), "client disconnected");
                break;
            }
            ReadEvent::Frame(Ok(Message::Close(_))) => {
                info!(chatter = %chatter.id(), "client disconnected");
                break;
            }
            ReadEvent::Frame(Ok(Message::Text(text))) => {
                let req: ChatRequest = match serde_json::from_str(&text) {
                    Ok(req) => req,
                    Err(err) => {
                        warn!(chatter = %chatter.id(), error = %err, "couldn't decode request");
                        continue;
                    }
                };
                chatter.touch_req().await;
                debug!(chatter = %chatter.id(), req = ?req, "request received");
                dispatch(chatter, ctx, req).await;
            }
            // Pings are answered by the protocol layer; binary frames carry
            // nothing we understand.
            ReadEvent::Frame(Ok(_)) => {}
            ReadEvent::Frame(Err(err)) => {
                warn!(chatter = %chatter.id(), error = %err, "couldn't receive");
                continue;
            }
        }
    }
}

/// Chatter-local requests are answered inline; everything else is stamped
/// with the sender and handed to its room.
async fn dispatch(chatter: &Arc<Chatter>, ctx: &Arc<AppContext>, req: ChatRequest) {
    match req.req_type {
        ReqType::SetNickname => {
            if req.content.is_empty() {
                chatter.enqueue(ChatResponse::new(
                    "",
                    RspType::ErrNicknameMandatory,
                    "Nickname cannot be blank.",
                    Vec::new(),
                ));
                return;
            }
            chatter.set_nickname(&req.content).await;
            chatter.enqueue(ChatResponse::new(
                "",
                RspType::SetNickname,
                format!("Nickname set to \"{}\".", req.content),
                Vec::new(),
            ));
        }
        ReqType::GetNickname => {
            let nickname = chatter.nickname().await;
            chatter.enqueue(ChatResponse::new(
                "",
                RspType::GetNickname,
                nickname,
                Vec::new(),
            ));
        }
        ReqType::ListRooms => {
            let rooms = ctx.manager.list_room_names().await;
            chatter.enqueue(ChatResponse::new("", RspType::ListRooms, "", rooms));
        }
        _ => {
            if req.room_name.is_empty() {
                chatter.enqueue(ChatResponse::new(
                    "",
                    RspType::ErrRoomMandatory,
                    "Room name is mandatory to access a room.",
                    Vec::new(),
                ));
                return;
            }
            match ctx.manager.find_or_create(&req.room_name).await {
                Ok(room) => room.submit(RoomRequest {
                    who: Arc::clone(chatter),
                    req,
                }),
                Err(err) => match err.to_response() {
                    Some(rsp) => chatter.enqueue(rsp),
                    None => warn!(chatter = %chatter.id(), error = %err, "room resolution failed"),
                },
            }
        }
    }
}

/// The writer task: the sole owner of the sink half. Drains the outbound
/// queue until either done signal fires, then closes the socket.
async fn write_loop(
    chatter: Arc<Chatter>,
    mut outbound: mpsc::Receiver<ChatResponse>,
    mut sink: SplitSink<WebSocket, Message>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            _ = chatter.done().cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            rsp = outbound.recv() => {
                let Some(rsp) = rsp else { break };
                chatter.touch_rsp().await;
                let frame = match serde_json::to_string(&rsp) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(chatter = %chatter.id(), error = %err, "couldn't encode response");
                        continue;
                    }
                };
                debug!(chatter = %chatter.id(), rsp = ?rsp, "response sent");
                if let Err(err) = sink.send(Message::Text(frame.into())).await {
                    info!(chatter = %chatter.id(), error = %err, "client disconnected");
                    // A failed send tears this chatter down; the reader is
                    // released by its select on the done signal.
                    chatter.done().cancel();
                    break;
                }
            }
        }
    }
}
