//! 다이어그램 수명주기
//!
//! `Uninitialized → Initialized`: 세션의 첫 사용자가 템플릿으로 초기화한다.
//! 동시에 접속한 다른 연결이 먼저 초기화했다면 그 결과를 그대로 따른다.
//! `Initialized → Uninitialized`: 마지막 사용자가 나가면 리셋한다.

use crate::store::{Diagram, SharedState, SharedStateStore, StoreError};
use crate::templates::Template;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramPhase {
    Uninitialized,
    Initialized,
}

impl DiagramPhase {
    pub fn of(diagram: &Diagram) -> Self {
        if diagram.initialized {
            DiagramPhase::Initialized
        } else {
            DiagramPhase::Uninitialized
        }
    }
}

/// 첫 접속 초기화. 세션이 이미 초기화돼 있으면 요청한 템플릿은 무시된다.
/// 반환값은 실제로 적용된 다이어그램이다.
pub async fn join_session(store: &SharedStateStore, requested: Template) -> Diagram {
    if store.is_initialized().await {
        return store.diagram().await;
    }

    match store.initialize(requested).await {
        Ok(diagram) => {
            tracing::info!(
                template = %requested,
                session_id = %diagram.session_id,
                "Diagram initialized"
            );
            diagram
        }
        Err(StoreError::AlreadyInitialized) => {
            // 다른 연결이 먼저 초기화함
            let diagram = store.diagram().await;
            tracing::debug!(
                requested = %requested,
                applied = ?diagram.template,
                "Lost initialization race, joining existing diagram"
            );
            diagram
        }
        Err(e) => {
            tracing::warn!(error = %e, "Unexpected error while initializing diagram");
            store.diagram().await
        }
    }
}

/// 사용자가 모두 나갔으면 리셋하고 새 상태를 반환한다.
pub async fn end_session_if_empty(store: &SharedStateStore) -> Option<SharedState> {
    let state = store.reset_if_empty().await?;
    tracing::info!(session_id = %state.diagram.session_id, "All users left, diagram reset");
    Some(state)
}
