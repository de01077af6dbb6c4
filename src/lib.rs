//! 공유 BPMN 다이어그램 실시간 협업 서버

pub mod broadcast;
pub mod config;
pub mod connections;
pub mod handlers;
pub mod lifecycle;
pub mod names;
pub mod protocol;
pub mod routes;
pub mod state;
pub mod store;
pub mod templates;
pub mod xml;

pub use routes::build_router;
pub use state::AppState;
