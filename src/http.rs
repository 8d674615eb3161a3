//! HTTP introspection endpoints: liveness and statistics.
//!
//! The stats payload is assembled purely from value snapshots taken by the
//! state layer; no live state ever crosses into a handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;

use crate::config::Config;
use crate::network::ConnectionLimiter;
use crate::state::ChatManager;

pub const ROUTE_CHAT: &str = "/v1.0/chat";
pub const ROUTE_ALIVE: &str = "/v1.0/alive";
pub const ROUTE_STATS: &str = "/v1.0/stats";

/// Everything the HTTP layer needs, shared across handlers.
pub struct AppContext {
    pub config: Config,
    pub info: ServerInfo,
    pub manager: Arc<ChatManager>,
    pub limiter: ConnectionLimiter,
    pub traffic: RouteTraffic,
}

impl AppContext {
    pub fn new(config: Config, manager: Arc<ChatManager>) -> Self {
        let limiter = ConnectionLimiter::new(config.limits.max_conns);
        let info = ServerInfo::new(&config);
        Self {
            config,
            info,
            manager,
            limiter,
            traffic: RouteTraffic::new(),
        }
    }
}

/// Static identity block served under `info` in `/v1.0/stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub version: String,
    pub name: String,
    pub hostname: String,
    #[serde(rename = "UUID")]
    pub uuid: String,
    pub port: u16,
    pub max_conns: usize,
    pub max_rooms: usize,
    pub max_idle: u64,
    #[serde(rename = "debugEnabled")]
    pub debug: bool,
}

impl ServerInfo {
    fn new(config: &Config) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            name: config.server.name.clone(),
            hostname: config.server.hostname.clone(),
            uuid: uuid::Uuid::new_v4().to_string(),
            port: config.server.port,
            max_conns: config.limits.max_conns,
            max_rooms: config.limits.max_rooms,
            max_idle: config.limits.max_idle_secs,
            debug: config.server.debug,
        }
    }
}

/// Server-wide request counters, grouped per route.
pub struct RouteTraffic {
    start: DateTime<Utc>,
    req_count: AtomicU64,
    req_bytes: AtomicU64,
    routes: DashMap<String, RouteCounters>,
}

#[derive(Default)]
struct RouteCounters {
    count: AtomicU64,
    bytes: AtomicU64,
}

impl RouteTraffic {
    fn new() -> Self {
        Self {
            start: Utc::now(),
            req_count: AtomicU64::new(0),
            req_bytes: AtomicU64::new(0),
            routes: DashMap::new(),
        }
    }

    pub fn record(&self, path: &str, bytes: u64) {
        self.req_count.fetch_add(1, Ordering::Relaxed);
        self.req_bytes.fetch_add(bytes, Ordering::Relaxed);
        let entry = self.routes.entry(path.to_string()).or_default();
        entry.count.fetch_add(1, Ordering::Relaxed);
        entry.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn route_stats(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for entry in self.routes.iter() {
            map.insert(
                entry.key().clone(),
                json!({
                    "requestCount": entry.value().count.load(Ordering::Relaxed),
                    "requestBytes": entry.value().bytes.load(Ordering::Relaxed),
                }),
            );
        }
        serde_json::Value::Object(map)
    }
}

/// Counts every request before it reaches its handler.
pub async fn track_route(
    State(ctx): State<Arc<AppContext>>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let bytes = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    ctx.traffic.record(&path, bytes);
    next.run(req).await
}

/// `GET /v1.0/alive` - liveness probe.
pub async fn alive_handler() -> StatusCode {
    StatusCode::OK
}

/// `GET /v1.0/stats` - full introspection snapshot.
pub async fn stats_handler(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let chatter_stats = ctx.manager.list_chatter_stats().await;
    let room_stats = ctx.manager.list_room_stats().await;
    Json(json!({
        "info": ctx.info,
        "options": ctx.config,
        "stats": {
            "startTime": ctx.traffic.start,
            "reqCount": ctx.traffic.req_count.load(Ordering::Relaxed),
            "reqBytes": ctx.traffic.req_bytes.load(Ordering::Relaxed),
            "routeStats": ctx.traffic.route_stats(),
            "chatterStats": chatter_stats,
            "roomStats": room_stats,
        },
        "memStats": mem_stats(),
    }))
}

/// Process memory usage sampled on demand.
fn mem_stats() -> serde_json::Value {
    use sysinfo::{ProcessRefreshKind, RefreshKind, System};

    let mut sys = System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::new().with_memory()),
    );
    sys.refresh_processes_specifics(ProcessRefreshKind::new().with_memory());
    let pid = sysinfo::Pid::from_u32(std::process::id());
    match sys.process(pid) {
        Some(process) => json!({
            "rssBytes": process.memory(),
            "virtualBytes": process.virtual_memory(),
        }),
        None => json!({ "rssBytes": 0u64, "virtualBytes": 0u64 }),
    }
}
