//! 수신 프레임 라우팅
//!
//! 메시지 간 상태는 없다. 프레임을 파싱/검증하고 해당 도메인 핸들러로 보낸다.
//! 파싱 단계 오류는 보낸 연결에만 `error`로 응답하며 연결은 유지된다.

use super::{document, locks, users, ClientSession};
use crate::protocol::{parse_frame_with, ClientMessage, ServerMessage};
use crate::state::AppState;

pub async fn route_frame(state: &AppState, session: &ClientSession, text: &str) {
    let message = match parse_frame_with(text, state.frame_limits()) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(user_id = %session.user_id, error = %e, "Rejected inbound frame");
            let _ = state
                .bus
                .send_to(session.connection_id, ServerMessage::error(e));
            return;
        }
    };

    tracing::debug!(user_id = %session.user_id, kind = message.kind().tag(), "Routing message");
    dispatch(state, session, message).await;
}

pub async fn dispatch(state: &AppState, session: &ClientSession, message: ClientMessage) {
    match message {
        ClientMessage::XmlUpdate { xml } => {
            document::handle_xml_update(state, session, xml).await;
        }
        ClientMessage::UserNameUpdate { name } => {
            users::handle_user_name_update(state, session, name).await;
        }
        ClientMessage::ElementSelect { element_ids } => {
            locks::handle_element_select(state, session, element_ids).await;
        }
        ClientMessage::ElementDeselect { element_id } => {
            locks::handle_element_deselect(state, session, element_id).await;
        }
    }
}
