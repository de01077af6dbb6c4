//! 클라이언트-서버 메시지 프로토콜 정의

use crate::store::{ElementId, LockMap, SharedState, UserId, UserMap};
use crate::templates::Template;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 클라이언트 → 서버 메시지
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    XmlUpdate {
        xml: String,
    },
    UserNameUpdate {
        name: String,
    },
    ElementSelect {
        #[serde(default)]
        element_ids: Vec<ElementId>,
    },
    ElementDeselect {
        element_id: ElementId,
    },
}

impl ClientMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ClientMessage::XmlUpdate { .. } => MessageKind::XmlUpdate,
            ClientMessage::UserNameUpdate { .. } => MessageKind::UserNameUpdate,
            ClientMessage::ElementSelect { .. } => MessageKind::ElementSelect,
            ClientMessage::ElementDeselect { .. } => MessageKind::ElementDeselect,
        }
    }
}

/// 수신 메시지 `type` 구분자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    XmlUpdate,
    UserNameUpdate,
    ElementSelect,
    ElementDeselect,
}

impl MessageKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "xml_update" => Some(Self::XmlUpdate),
            "user_name_update" => Some(Self::UserNameUpdate),
            "element_select" => Some(Self::ElementSelect),
            "element_deselect" => Some(Self::ElementDeselect),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::XmlUpdate => "xml_update",
            Self::UserNameUpdate => "user_name_update",
            Self::ElementSelect => "element_select",
            Self::ElementDeselect => "element_deselect",
        }
    }
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 새 연결에만 직접 전송
    Init {
        user_id: UserId,
        user_name: String,
        xml: String,
        users: UserMap,
        locked_elements: LockMap,
        template: Option<Template>,
        is_initialized: bool,
        session_id: Uuid,
    },
    XmlUpdate {
        xml: String,
    },
    UsersUpdate {
        users: UserMap,
    },
    LockedElementsUpdate {
        locked_elements: LockMap,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn init(user_id: &str, user_name: &str, state: SharedState) -> Self {
        ServerMessage::Init {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            xml: state.diagram.xml,
            users: state.users,
            locked_elements: state.locks,
            template: state.diagram.template,
            is_initialized: state.diagram.initialized,
            session_id: state.diagram.session_id,
        }
    }

    pub fn error(message: impl ToString) -> Self {
        ServerMessage::Error {
            message: message.to_string(),
        }
    }
}
