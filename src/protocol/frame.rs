//! 수신 텍스트 프레임 파싱 및 스키마 검증
//!
//! 1. JSON 구문 검사 → `MalformedFrame`
//! 2. `type` 구분자 확인 → `UnknownMessageType`
//! 3. serde 역직렬화 후 필드 제약 검사 → `SchemaValidation { field }`

use super::messages::{ClientMessage, MessageKind};
use serde_json::Value;

pub const MAX_USER_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid JSON format")]
    MalformedFrame,

    #[error("Unknown message type: {}", .0.as_deref().unwrap_or("<missing>"))]
    UnknownMessageType(Option<String>),

    #[error("Validation error at '{field}': {reason}")]
    SchemaValidation { field: String, reason: String },
}

impl ProtocolError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ProtocolError::SchemaValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 필드 제약
#[derive(Debug, Clone, Copy)]
pub struct FrameLimits {
    pub max_user_name_len: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_user_name_len: MAX_USER_NAME_LEN,
        }
    }
}

pub fn parse_frame(text: &str) -> Result<ClientMessage, ProtocolError> {
    parse_frame_with(text, FrameLimits::default())
}

pub fn parse_frame_with(text: &str, limits: FrameLimits) -> Result<ClientMessage, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::MalformedFrame)?;

    let Value::Object(obj) = value else {
        return Err(ProtocolError::UnknownMessageType(None));
    };

    let kind = match obj.get("type") {
        Some(Value::String(tag)) => MessageKind::from_tag(tag)
            .ok_or_else(|| ProtocolError::UnknownMessageType(Some(tag.clone())))?,
        Some(other) => return Err(ProtocolError::UnknownMessageType(Some(other.to_string()))),
        None => return Err(ProtocolError::UnknownMessageType(None)),
    };

    // 알 수 없는 추가 필드는 무시
    let message: ClientMessage = serde_json::from_value(Value::Object(obj))
        .map_err(|e| ProtocolError::invalid(payload_field(kind), e.to_string()))?;

    check_constraints(&message, limits)?;
    Ok(message)
}

/// 변형별 페이로드 필드 이름
fn payload_field(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::XmlUpdate => "xml",
        MessageKind::UserNameUpdate => "name",
        MessageKind::ElementSelect => "element_ids",
        MessageKind::ElementDeselect => "element_id",
    }
}

fn check_constraints(message: &ClientMessage, limits: FrameLimits) -> Result<(), ProtocolError> {
    match message {
        ClientMessage::XmlUpdate { xml } => non_empty("xml", xml),
        ClientMessage::UserNameUpdate { name } => {
            non_empty("name", name)?;
            let len = name.chars().count();
            if len > limits.max_user_name_len {
                return Err(ProtocolError::invalid(
                    "name",
                    format!(
                        "must be at most {} characters (got {})",
                        limits.max_user_name_len, len
                    ),
                ));
            }
            Ok(())
        }
        ClientMessage::ElementSelect { .. } => Ok(()),
        ClientMessage::ElementDeselect { element_id } => non_empty("element_id", element_id),
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), ProtocolError> {
    if value.is_empty() {
        return Err(ProtocolError::invalid(field, "must not be empty"));
    }
    Ok(())
}
