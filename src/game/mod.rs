//! 방, 플레이어, 매치 진행 도메인

pub mod augment;
pub mod color;
pub mod effects;
pub mod registry;
pub mod room;
pub mod round;
pub mod spawn;
pub mod team;

pub use registry::RoomRegistry;
pub use room::{
    ActiveAugment, Player, Roster, Room, RoomSettings, RoomStatus, RoomSummary, RoomView,
    RoundResult, RoundStanding, Team, Visibility,
};

use std::time::{SystemTime, UNIX_EPOCH};

/// 팀전 게임 모드 이름
pub const TEAM_MODE: &str = "팀전";

/// 기본 게임 모드 (개인전)
pub const DEFAULT_GAME_MODE: &str = "개인전";

/// 최대 체력 (스폰/리스폰 시 값)
pub const MAX_HEALTH: i32 = 100;

/// 유닉스 epoch 기준 밀리초
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
