//! The server-side representation of one connected client.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::proto::ChatResponse;
use crate::state::stats::{ChatterStats, TrafficCounters};
use crate::state::uid::ChatterId;

/// One live connection.
///
/// The reader and writer loops share this handle; rooms hold it (via `Arc`)
/// for the lifetime of a membership. Only the writer loop touches the socket
/// with what it drains from `outbound` - everything else funnels responses
/// through [`Chatter::enqueue`].
#[derive(Debug)]
pub struct Chatter {
    id: ChatterId,
    remote_addr: String,
    nickname: Mutex<String>,
    outbound: mpsc::Sender<ChatResponse>,
    done: CancellationToken,
    counters: Mutex<TrafficCounters>,
}

impl Chatter {
    pub(crate) fn new(
        id: ChatterId,
        remote_addr: String,
        outbound: mpsc::Sender<ChatResponse>,
    ) -> Self {
        Self {
            id,
            remote_addr,
            nickname: Mutex::new(String::new()),
            outbound,
            done: CancellationToken::new(),
            counters: Mutex::new(TrafficCounters::new()),
        }
    }

    pub fn id(&self) -> ChatterId {
        self.id
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// The chatter's one-shot teardown signal. Fired once by the session
    /// that owns the connection; observed by both loops and by `enqueue`.
    pub fn done(&self) -> &CancellationToken {
        &self.done
    }

    pub async fn nickname(&self) -> String {
        self.nickname.lock().await.clone()
    }

    pub async fn set_nickname(&self, nickname: &str) {
        *self.nickname.lock().await = nickname.to_string();
    }

    pub(crate) async fn touch_req(&self) {
        self.counters.lock().await.touch_req();
    }

    pub(crate) async fn touch_rsp(&self) {
        self.counters.lock().await.touch_rsp();
    }

    /// Queue a response for the writer loop.
    ///
    /// Nothing is queued once the done signal has fired; a full queue drops
    /// the frame (backpressure policy), a closed queue means the writer is
    /// already gone.
    pub fn enqueue(&self, rsp: ChatResponse) {
        if self.done.is_cancelled() {
            return;
        }
        if let Err(err) = self.outbound.try_send(rsp) {
            match err {
                TrySendError::Full(_) => {
                    debug!(chatter = %self.id, "outbound queue full, response dropped");
                }
                TrySendError::Closed(_) => {}
            }
        }
    }

    pub async fn stats_snapshot(&self) -> ChatterStats {
        let counters = self.counters.lock().await.clone();
        ChatterStats {
            nickname: self.nickname().await,
            remote_addr: self.remote_addr.clone(),
            start: counters.start,
            last_req: counters.last_req,
            last_rsp: counters.last_rsp,
            req_count: counters.req_count,
            rsp_count: counters.rsp_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::RspType;
    use crate::state::uid::ChatterIdGenerator;

    fn test_chatter(capacity: usize) -> (Chatter, mpsc::Receiver<ChatResponse>) {
        let (tx, rx) = mpsc::channel(capacity);
        let ids = ChatterIdGenerator::default();
        (Chatter::new(ids.next(), "127.0.0.1:9".to_string(), tx), rx)
    }

    #[tokio::test]
    async fn enqueue_delivers_to_the_outbound_queue() {
        let (chatter, mut rx) = test_chatter(4);
        chatter.enqueue(ChatResponse::new("", RspType::GetNickname, "", Vec::new()));
        let rsp = rx.recv().await.expect("response");
        assert_eq!(rsp.rsp_type, RspType::GetNickname);
    }

    #[tokio::test]
    async fn nothing_is_queued_after_done_fires() {
        let (chatter, mut rx) = test_chatter(4);
        chatter.done().cancel();
        chatter.enqueue(ChatResponse::new("", RspType::GetNickname, "", Vec::new()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_drops_the_frame() {
        let (chatter, mut rx) = test_chatter(1);
        chatter.enqueue(ChatResponse::new("", RspType::GetNickname, "first", Vec::new()));
        chatter.enqueue(ChatResponse::new("", RspType::GetNickname, "second", Vec::new()));
        assert_eq!(rx.recv().await.expect("response").content, "first");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn snapshot_reflects_counters() {
        let (chatter, _rx) = test_chatter(4);
        chatter.set_nickname("Alice").await;
        chatter.touch_req().await;
        chatter.touch_req().await;
        chatter.touch_rsp().await;
        let stats = chatter.stats_snapshot().await;
        assert_eq!(stats.nickname, "Alice");
        assert_eq!(stats.req_count, 2);
        assert_eq!(stats.rsp_count, 1);
        assert!(stats.last_req.is_some());
    }
}
