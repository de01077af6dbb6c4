//! 브로드캐스트 버스
//!
//! 레지스트리를 빌려 메시지를 팬아웃한다. 연결별 전송은 서로 격리되며,
//! 전송에 실패한 연결은 죽은 것으로 보고 레지스트리에서 제거한다.

use crate::connections::{ConnectionId, ConnectionRegistry};
use crate::protocol::ServerMessage;
use crate::store::UserId;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    #[error("Connection {0} is closed")]
    Closed(ConnectionId),
}

/// 브로드캐스트 결과
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// 전송 실패로 제거된 연결
    pub evicted: Vec<(ConnectionId, UserId)>,
}

#[derive(Debug, Clone)]
pub struct BroadcastBus {
    registry: ConnectionRegistry,
}

impl BroadcastBus {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// 한 연결에만 전송. 실패해도 상태는 건드리지 않는다.
    pub fn send_to(&self, id: ConnectionId, message: ServerMessage) -> Result<(), DeliveryError> {
        let sender = self
            .registry
            .sender(id)
            .ok_or(DeliveryError::UnknownConnection(id))?;
        sender.send(message).map_err(|_| DeliveryError::Closed(id))
    }

    /// `exclude`를 제외한 모든 연결에 전송. 재시도는 없다.
    pub fn broadcast(&self, message: ServerMessage, exclude: Option<ConnectionId>) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();

        for (id, sender) in self.registry.recipients(exclude) {
            match sender.send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(_) => dead.push(id),
            }
        }

        // 대상 목록의 맵 락이 풀린 뒤에 제거
        for id in dead {
            if let Some(user_id) = self.registry.evict(id) {
                tracing::warn!(connection_id = %id, user_id = %user_id, "Delivery failed, connection evicted");
                report.evicted.push((id, user_id));
            }
        }

        tracing::debug!(
            delivered = report.delivered,
            evicted = report.evicted.len(),
            excluded = ?exclude.map(|id| id.to_string()),
            "Broadcast completed"
        );
        report
    }
}
