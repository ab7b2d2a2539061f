//! 와이어 프로토콜

pub mod messages;
pub mod outbox;

pub use messages::*;
pub use outbox::Outbox;
