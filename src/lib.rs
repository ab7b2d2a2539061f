//! 2D 아레나 슈터 세션 서버
//!
//! 방 생명주기, 팀/색상 배정, 매치 상태(체력, 라운드, 승수)를 관리하고
//! 클라이언트 간 실시간 입력/이벤트를 중계한다.

pub mod config;
pub mod error;
pub mod game;
pub mod handlers;
pub mod protocol;
pub mod state;
