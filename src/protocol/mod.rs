//! 와이어 프로토콜

pub mod frame;
pub mod messages;

pub use frame::*;
pub use messages::*;
