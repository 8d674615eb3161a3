//! Value snapshots served by the `/v1.0/stats` endpoint.
//!
//! Handlers never see live state; every snapshot is copied out under the
//! owning component's lock.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time statistics for one connected chatter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatterStats {
    pub nickname: String,
    pub remote_addr: String,
    pub start: DateTime<Utc>,
    pub last_req: Option<DateTime<Utc>>,
    pub last_rsp: Option<DateTime<Utc>>,
    pub req_count: u64,
    pub rsp_count: u64,
}

/// Point-in-time statistics for one live room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStats {
    pub name: String,
    pub start: DateTime<Utc>,
    pub last_req: Option<DateTime<Utc>>,
    pub last_rsp: Option<DateTime<Utc>>,
    pub req_count: u64,
    pub rsp_count: u64,
    pub members: Vec<RoomMemberStats>,
}

/// One room member as seen by the stats snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMemberStats {
    pub nickname: String,
    pub remote_addr: String,
    pub hidden: bool,
}

/// Request/response counters shared by chatters and rooms.
#[derive(Debug, Clone)]
pub(crate) struct TrafficCounters {
    pub start: DateTime<Utc>,
    pub last_req: Option<DateTime<Utc>>,
    pub last_rsp: Option<DateTime<Utc>>,
    pub req_count: u64,
    pub rsp_count: u64,
}

impl TrafficCounters {
    pub fn new() -> Self {
        Self {
            start: Utc::now(),
            last_req: None,
            last_rsp: None,
            req_count: 0,
            rsp_count: 0,
        }
    }

    pub fn touch_req(&mut self) {
        self.last_req = Some(Utc::now());
        self.req_count += 1;
    }

    pub fn touch_rsp(&mut self) {
        self.last_rsp = Some(Utc::now());
        self.rsp_count += 1;
    }
}
