//! HTTP 라우터 및 WebSocket 연결 처리

use crate::connections::ConnectionHandle;
use crate::handlers;
use crate::lifecycle::DiagramPhase;
use crate::state::AppState;
use crate::templates::Template;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(state_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// 연결 없이 조회하는 상태 스냅샷 (모니터링용)
async fn state_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.store.snapshot().await;
    let phase = DiagramPhase::of(&snapshot.diagram);
    Json(serde_json::json!({
        "status": if state.is_running() { "running" } else { "stopped" },
        "xml": snapshot.diagram.xml,
        "users": snapshot.users,
        "locked_elements": snapshot.locks,
        "template": snapshot.diagram.template,
        "is_initialized": snapshot.diagram.initialized,
        "phase": phase,
        "session_id": snapshot.diagram.session_id,
        "connections": state.connections.len(),
    }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "diagram-sync-server",
        "connections": state.connections.len(),
        "timestamp": std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if !state.is_running() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }

    // 중복/알 수 없는 값도 거부하지 않고 기본 템플릿으로 해석
    let template = Template::from_param(params.get("template").map(String::as_str));
    ws.on_failed_upgrade(|e| {
        tracing::warn!(error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| handle_socket(socket, state, template))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, template: Template) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (handle, mut rx) = ConnectionHandle::channel();

    // 송신 태스크
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to serialize outgoing message"),
            }
        }
        let _ = ws_sender.close().await;
    });

    // 연결 처리
    let session = match handlers::handle_connection(&state, handle, template).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "Connection admission failed");
            send_task.abort();
            return;
        }
    };

    // 수신 처리
    let recv_state = state.clone();
    let recv_session = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    handlers::route_frame(&recv_state, &recv_session, &text).await;
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::debug!(user_id = %recv_session.user_id, error = %e, "WebSocket read error");
                    break;
                }
                _ => {}
            }
        }
    });

    // 어느 한쪽이 끝나면 다른 쪽도 정리
    tokio::select! {
        result = &mut recv_task => {
            if let Err(e) = result {
                tracing::error!(user_id = %session.user_id, error = %e, "Receive task failed");
            }
            send_task.abort();
        }
        _ = &mut send_task => {
            recv_task.abort();
        }
    }

    // 연결 해제 (오류로 끝났어도 항상 수행)
    handlers::handle_disconnect(&state, &session).await;
}
