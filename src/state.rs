//! 애플리케이션 상태 관리

use crate::broadcast::BroadcastBus;
use crate::config::Config;
use crate::connections::ConnectionRegistry;
use crate::protocol::FrameLimits;
use crate::store::SharedStateStore;
use crate::templates::TemplateCatalog;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 서버 전역 상태 (composition root가 소유)
pub struct AppState {
    /// 다이어그램/사용자/잠금 단일 진실 공급원
    pub store: SharedStateStore,
    /// 연결 → user_id
    pub connections: ConnectionRegistry,
    pub bus: BroadcastBus,
    pub config: Arc<Config>,
    running: AtomicBool,
}

impl AppState {
    pub fn new(config: Config, catalog: TemplateCatalog) -> Self {
        let connections = ConnectionRegistry::new();
        Self {
            store: SharedStateStore::new(Arc::new(catalog)),
            bus: BroadcastBus::new(connections.clone()),
            connections,
            config: Arc::new(config),
            running: AtomicBool::new(true),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_user_name_len: self.config.session.max_user_name_len,
        }
    }

    /// 새 연결을 받지 않고 기존 연결을 모두 닫는다. 닫힌 연결 수를 반환.
    pub fn close(&self) -> usize {
        if !self.running.swap(false, Ordering::AcqRel) {
            return 0;
        }
        let closed = self.connections.clear();
        tracing::info!(closed_connections = closed, "Application state closed");
        closed
    }
}
