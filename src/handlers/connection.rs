//! 연결 핸들러

use crate::connections::{ConnectError, ConnectionHandle, ConnectionId};
use crate::lifecycle;
use crate::names::random_display_name;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::store::{StoreError, UserId};
use crate::templates::Template;

/// 연결 하나에 대한 처리 문맥
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
}

/// 새 연결 처리
///
/// 등록 → 사용자 추가 → (세션 첫 사용자면) 다이어그램 초기화 → `init` 전송 →
/// 나머지에게 `users_update` 브로드캐스트
pub async fn handle_connection(
    state: &AppState,
    handle: ConnectionHandle,
    template: Template,
) -> Result<ClientSession, ConnectError> {
    let connection_id = handle.id;
    let user_id = state.connections.admit(handle)?;
    let session = ClientSession {
        connection_id,
        user_id,
    };

    let user_name = random_display_name();
    if let Err(e) = state.store.add_user(&session.user_id, &user_name).await {
        state.connections.evict(connection_id);
        tracing::warn!(user_id = %session.user_id, error = %e, "Rejected new user");
        return Err(e.into());
    }

    if !state.store.is_initialized().await {
        lifecycle::join_session(&state.store, template).await;
    }

    let snapshot = state.store.snapshot().await;
    let users = snapshot.users.clone();
    let applied = snapshot.diagram.template;

    if let Err(e) = state.bus.send_to(
        connection_id,
        ServerMessage::init(&session.user_id, &user_name, snapshot),
    ) {
        // 쓰기 태스크가 이미 종료됨. 정리는 소켓 태스크가 수행한다.
        tracing::warn!(user_id = %session.user_id, error = %e, "Failed to send init");
    }

    state
        .bus
        .broadcast(ServerMessage::UsersUpdate { users }, Some(connection_id));

    tracing::info!(
        connection_id = %connection_id,
        user_id = %session.user_id,
        user_name = %user_name,
        requested_template = %template,
        applied_template = ?applied,
        "New connection established"
    );
    Ok(session)
}

/// 연결 해제 처리. 여러 번 호출되어도 안전하다.
///
/// 잠금 해제와 사용자 제거 후 남은 사용자/잠금 상태를 모두에게 알리고,
/// 마지막 사용자였다면 다이어그램을 리셋한다.
pub async fn handle_disconnect(state: &AppState, session: &ClientSession) {
    state.connections.evict(session.connection_id);

    match state.store.release_user(&session.user_id).await {
        Ok((users, locked_elements)) => {
            state.bus.broadcast(ServerMessage::UsersUpdate { users }, None);
            state
                .bus
                .broadcast(ServerMessage::LockedElementsUpdate { locked_elements }, None);
        }
        Err(StoreError::UnknownUser) => {
            tracing::debug!(user_id = %session.user_id, "User already released");
        }
        Err(e) => {
            tracing::warn!(user_id = %session.user_id, error = %e, "Failed to release user");
        }
    }

    lifecycle::end_session_if_empty(&state.store).await;

    tracing::info!(
        connection_id = %session.connection_id,
        user_id = %session.user_id,
        "Connection closed"
    );
}
