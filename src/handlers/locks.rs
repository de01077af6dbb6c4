//! 요소 잠금 핸들러

use super::ClientSession;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::store::ElementId;

/// `element_select`: 이전 잠금을 모두 풀고 요청한 요소를 순서대로 잠근다.
/// 이미 다른 사용자가 가진 요소는 건너뛰며, 결과 잠금 상태를 모두에게 알린다.
pub async fn handle_element_select(
    state: &AppState,
    session: &ClientSession,
    element_ids: Vec<ElementId>,
) {
    match state
        .store
        .replace_selection(&session.user_id, &element_ids)
        .await
    {
        Ok((locked_elements, skipped)) => {
            for element_id in &skipped {
                tracing::warn!(
                    user_id = %session.user_id,
                    element_id = %element_id,
                    "Could not lock element, skipped"
                );
            }
            state
                .bus
                .broadcast(ServerMessage::LockedElementsUpdate { locked_elements }, None);
            tracing::debug!(
                user_id = %session.user_id,
                requested = element_ids.len(),
                skipped = skipped.len(),
                "Selection updated"
            );
        }
        Err(e) => {
            tracing::warn!(user_id = %session.user_id, error = %e, "Selection rejected");
        }
    }
}

/// `element_deselect`: 소유자만 해제 가능
pub async fn handle_element_deselect(
    state: &AppState,
    session: &ClientSession,
    element_id: ElementId,
) {
    match state
        .store
        .unlock_element(&session.user_id, &element_id)
        .await
    {
        Ok(locked_elements) => {
            state
                .bus
                .broadcast(ServerMessage::LockedElementsUpdate { locked_elements }, None);
            tracing::debug!(user_id = %session.user_id, element_id = %element_id, "Element unlocked");
        }
        Err(e) => {
            tracing::warn!(
                user_id = %session.user_id,
                element_id = %element_id,
                error = %e,
                "Deselect rejected"
            );
            let _ = state
                .bus
                .send_to(session.connection_id, ServerMessage::error(e));
        }
    }
}
