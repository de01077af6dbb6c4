//! 핸들러 모듈

pub mod connection;
pub mod document;
pub mod locks;
pub mod router;
pub mod users;

pub use connection::*;
pub use document::*;
pub use locks::*;
pub use router::*;
pub use users::*;
