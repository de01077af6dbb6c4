//! 연결 레지스트리
//!
//! 살아 있는 연결과 그 연결에 배정된 user_id를 추적한다.
//! 저장소 락과는 독립적으로 동기화되며 둘을 동시에 잡는 일은 없다.

use crate::protocol::ServerMessage;
use crate::store::{StoreError, UserId};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// 연결별 송신 채널 (수신측은 소켓 쓰기 태스크)
pub type ConnectionSender = UnboundedSender<ServerMessage>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 전송 계층이 만든 연결 핸들
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub sender: ConnectionSender,
}

impl ConnectionHandle {
    pub fn new(sender: ConnectionSender) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
        }
    }

    /// 테스트와 내부 배선용: 핸들과 수신측을 함께 만든다
    pub fn channel() -> (Self, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Connection {0} closed before admission")]
    ChannelClosed(ConnectionId),

    #[error("Connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    #[error("User rejected: {0}")]
    Rejected(#[from] StoreError),
}

/// 등록된 연결 정보
#[derive(Debug)]
pub struct Connection {
    pub user_id: UserId,
    pub sender: ConnectionSender,
    pub connected_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 새 user_id를 발급하고 연결을 등록한다.
    /// 반환 직후부터 브로드캐스트 대상이 된다.
    pub fn admit(&self, handle: ConnectionHandle) -> Result<UserId, ConnectError> {
        if handle.sender.is_closed() {
            return Err(ConnectError::ChannelClosed(handle.id));
        }

        let user_id = Uuid::new_v4().to_string();
        match self.connections.entry(handle.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ConnectError::AlreadyRegistered(handle.id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Connection {
                    user_id: user_id.clone(),
                    sender: handle.sender,
                    connected_at: Instant::now(),
                });
                tracing::debug!(connection_id = %handle.id, user_id = %user_id, "Connection admitted");
                Ok(user_id)
            }
        }
    }

    /// 등록되지 않은 연결이면 아무 일도 하지 않는다
    pub fn evict(&self, id: ConnectionId) -> Option<UserId> {
        self.connections.remove(&id).map(|(_, conn)| {
            tracing::debug!(
                connection_id = %id,
                user_id = %conn.user_id,
                duration_secs = conn.connected_at.elapsed().as_secs(),
                "Connection evicted"
            );
            conn.user_id
        })
    }

    pub fn lookup(&self, id: ConnectionId) -> Option<UserId> {
        self.connections.get(&id).map(|conn| conn.user_id.clone())
    }

    pub fn sender(&self, id: ConnectionId) -> Option<ConnectionSender> {
        self.connections.get(&id).map(|conn| conn.sender.clone())
    }

    /// 브로드캐스트 대상 목록. 맵 락은 반환 전에 풀린다.
    pub fn recipients(&self, exclude: Option<ConnectionId>) -> Vec<(ConnectionId, ConnectionSender)> {
        self.connections
            .iter()
            .filter(|entry| Some(*entry.key()) != exclude)
            .map(|entry| (*entry.key(), entry.value().sender.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// 모든 연결 제거. 송신 채널이 닫히면서 쓰기 태스크가 종료된다.
    pub fn clear(&self) -> usize {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|e| *e.key()).collect();
        ids.into_iter().filter(|id| self.evict(*id).is_some()).count()
    }
}
