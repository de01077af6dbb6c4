//! 문서 갱신 핸들러

use super::ClientSession;
use crate::protocol::ServerMessage;
use crate::state::AppState;

/// `xml_update`: 검증 후 저장하고 보낸 사람을 제외한 모두에게 전달
pub async fn handle_xml_update(state: &AppState, session: &ClientSession, xml: String) {
    match state.store.update_document(xml).await {
        Ok(xml) => {
            let len = xml.len();
            state
                .bus
                .broadcast(ServerMessage::XmlUpdate { xml }, Some(session.connection_id));
            tracing::debug!(user_id = %session.user_id, bytes = len, "Document updated");
        }
        Err(e) => {
            tracing::warn!(user_id = %session.user_id, error = %e, "Document update rejected");
            let _ = state
                .bus
                .send_to(session.connection_id, ServerMessage::error(e));
        }
    }
}
