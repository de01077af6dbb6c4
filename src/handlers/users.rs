//! 사용자 이름 변경 핸들러

use super::ClientSession;
use crate::protocol::ServerMessage;
use crate::state::AppState;

/// `user_name_update`: 본인 포함 모두에게 `users_update`
pub async fn handle_user_name_update(state: &AppState, session: &ClientSession, name: String) {
    match state.store.rename_user(&session.user_id, &name).await {
        Ok(users) => {
            state.bus.broadcast(ServerMessage::UsersUpdate { users }, None);
            tracing::debug!(user_id = %session.user_id, name = %name, "User renamed");
        }
        Err(e) => {
            tracing::warn!(user_id = %session.user_id, error = %e, "Rename rejected");
            let _ = state
                .bus
                .send_to(session.connection_id, ServerMessage::error(e));
        }
    }
}
