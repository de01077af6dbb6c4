//! 공유 상태 저장소
//!
//! 다이어그램 문서, 접속 사용자, 요소 잠금을 하나의 집합체로 보관한다.
//! 모든 변경 연산은 하나의 쓰기 락 안에서 검사-변경-반환을 한 단위로 수행한다.
//! 필드별로 락을 나누지 않으므로 "사용자 제거"와 "그 사용자의 잠금 획득"이
//! 끼어들어 주인 없는 잠금이 생기는 일이 없다.

use crate::templates::{Template, TemplateCatalog};
use crate::xml::is_well_formed;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub type UserId = String;
pub type ElementId = String;

/// user_id → 표시 이름
pub type UserMap = HashMap<UserId, String>;
/// element_id → 잠금 소유 user_id
pub type LockMap = HashMap<ElementId, UserId>;

/// 저장소 도메인 오류. 메시지는 그대로 클라이언트 `error`로 전달된다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid XML provided")]
    InvalidDocument,

    #[error("User with this ID already exists")]
    DuplicateUser,

    #[error("User with this ID does not exist")]
    UnknownUser,

    #[error("Element is already locked")]
    AlreadyLocked,

    #[error("Element is not locked by this user")]
    NotOwner,

    #[error("Diagram is already initialized")]
    AlreadyInitialized,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 다이어그램 세션 정보
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagram {
    /// 리셋마다 새로 발급되는 세대 식별자
    pub session_id: Uuid,
    pub xml: String,
    pub template: Option<Template>,
    pub initialized: bool,
}

impl Diagram {
    fn fresh(default_xml: &str) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            xml: default_xml.to_string(),
            template: None,
            initialized: false,
        }
    }
}

/// 공유 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedState {
    pub diagram: Diagram,
    pub users: UserMap,
    #[serde(rename = "locked_elements")]
    pub locks: LockMap,
}

impl SharedState {
    fn fresh(default_xml: &str) -> Self {
        Self {
            diagram: Diagram::fresh(default_xml),
            users: UserMap::new(),
            locks: LockMap::new(),
        }
    }
}

pub struct SharedStateStore {
    inner: RwLock<SharedState>,
    catalog: Arc<TemplateCatalog>,
}

impl SharedStateStore {
    pub fn new(catalog: Arc<TemplateCatalog>) -> Self {
        let state = SharedState::fresh(catalog.default_document());
        Self {
            inner: RwLock::new(state),
            catalog,
        }
    }

    // ---- 읽기 (비배타) ----

    pub async fn snapshot(&self) -> SharedState {
        self.inner.read().await.clone()
    }

    pub async fn diagram(&self) -> Diagram {
        self.inner.read().await.diagram.clone()
    }

    pub async fn document(&self) -> String {
        self.inner.read().await.diagram.xml.clone()
    }

    pub async fn users(&self) -> UserMap {
        self.inner.read().await.users.clone()
    }

    pub async fn locked_elements(&self) -> LockMap {
        self.inner.read().await.locks.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.read().await.diagram.initialized
    }

    /// 사용자가 한 명도 없으면 true
    pub async fn should_reset(&self) -> bool {
        self.inner.read().await.users.is_empty()
    }

    // ---- 문서 ----

    pub async fn update_document(&self, new_xml: String) -> StoreResult<String> {
        // 상태와 무관한 검사라 락 밖에서 수행
        if !is_well_formed(&new_xml) {
            return Err(StoreError::InvalidDocument);
        }

        let mut state = self.inner.write().await;
        state.diagram.xml = new_xml;
        Ok(state.diagram.xml.clone())
    }

    // ---- 사용자 ----

    pub async fn add_user(&self, id: &str, name: &str) -> StoreResult<UserMap> {
        let mut state = self.inner.write().await;
        if state.users.contains_key(id) {
            return Err(StoreError::DuplicateUser);
        }
        state.users.insert(id.to_string(), name.to_string());
        Ok(state.users.clone())
    }

    pub async fn remove_user(&self, id: &str) -> StoreResult<UserMap> {
        let mut state = self.inner.write().await;
        if state.users.remove(id).is_none() {
            return Err(StoreError::UnknownUser);
        }
        Ok(state.users.clone())
    }

    pub async fn rename_user(&self, id: &str, name: &str) -> StoreResult<UserMap> {
        let mut state = self.inner.write().await;
        let Some(current) = state.users.get_mut(id) else {
            return Err(StoreError::UnknownUser);
        };
        *current = name.to_string();
        Ok(state.users.clone())
    }

    // ---- 잠금 ----

    /// 같은 사용자의 재잠금도 `AlreadyLocked`
    pub async fn lock_element(&self, user_id: &str, element_id: &str) -> StoreResult<LockMap> {
        let mut state = self.inner.write().await;
        if state.locks.contains_key(element_id) {
            return Err(StoreError::AlreadyLocked);
        }
        state
            .locks
            .insert(element_id.to_string(), user_id.to_string());
        Ok(state.locks.clone())
    }

    pub async fn unlock_element(&self, user_id: &str, element_id: &str) -> StoreResult<LockMap> {
        let mut state = self.inner.write().await;
        match state.locks.get(element_id) {
            Some(owner) if owner == user_id => {
                state.locks.remove(element_id);
                Ok(state.locks.clone())
            }
            _ => Err(StoreError::NotOwner),
        }
    }

    pub async fn clear_locks_by(&self, user_id: &str) -> StoreResult<LockMap> {
        let mut state = self.inner.write().await;
        if !state.users.contains_key(user_id) {
            return Err(StoreError::UnknownUser);
        }
        state.locks.retain(|_, owner| owner != user_id);
        Ok(state.locks.clone())
    }

    /// 선택 교체: 기존 잠금을 모두 풀고 요청 순서대로 잠금을 시도한다.
    /// 다른 사용자가 가진 요소는 건너뛰고, 건너뛴 요소 목록을 함께 반환한다.
    pub async fn replace_selection(
        &self,
        user_id: &str,
        element_ids: &[ElementId],
    ) -> StoreResult<(LockMap, Vec<ElementId>)> {
        let mut state = self.inner.write().await;
        if !state.users.contains_key(user_id) {
            return Err(StoreError::UnknownUser);
        }
        state.locks.retain(|_, owner| owner != user_id);

        let mut skipped = Vec::new();
        for element_id in element_ids {
            if state.locks.contains_key(element_id) {
                skipped.push(element_id.clone());
                continue;
            }
            state.locks.insert(element_id.clone(), user_id.to_string());
        }
        Ok((state.locks.clone(), skipped))
    }

    /// 연결 종료 정리: 잠금 해제 후 사용자 제거를 한 임계 구역에서 수행
    pub async fn release_user(&self, user_id: &str) -> StoreResult<(UserMap, LockMap)> {
        let mut state = self.inner.write().await;
        if !state.users.contains_key(user_id) {
            return Err(StoreError::UnknownUser);
        }
        state.locks.retain(|_, owner| owner != user_id);
        state.users.remove(user_id);
        Ok((state.users.clone(), state.locks.clone()))
    }

    // ---- 다이어그램 수명주기 ----

    pub async fn initialize(&self, template: Template) -> StoreResult<Diagram> {
        let mut state = self.inner.write().await;
        if state.diagram.initialized {
            return Err(StoreError::AlreadyInitialized);
        }
        state.diagram.xml = self.catalog.document(template).to_string();
        state.diagram.template = Some(template);
        state.diagram.initialized = true;
        Ok(state.diagram.clone())
    }

    pub async fn reset(&self) -> SharedState {
        let mut state = self.inner.write().await;
        *state = SharedState::fresh(self.catalog.default_document());
        state.clone()
    }

    /// `should_reset` 확인과 `reset`을 한 임계 구역에서 수행한다.
    /// 확인 직후 새 사용자가 들어와도 그 사용자를 지우지 않는다.
    pub async fn reset_if_empty(&self) -> Option<SharedState> {
        let mut state = self.inner.write().await;
        if !state.users.is_empty() {
            return None;
        }
        *state = SharedState::fresh(self.catalog.default_document());
        Some(state.clone())
    }
}
