//! 요청 단위 에러 정의
//!
//! 모든 핸들러 실패는 ack 로만 전달되며 프로세스나 다른 연결에 영향을 주지 않는다.

use serde::Serialize;

/// ack 로 클라이언트에 전달되는 에러 코드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameError {
    /// 방 개수 한도 초과
    #[error("room limit reached")]
    RoomLimit,
    /// 방 정원 또는 팀 정원 초과
    #[error("room is full")]
    Full,
    /// 존재하지 않는 방
    #[error("room not found")]
    NotFound,
    /// 요청자가 어떤 방에도 없음
    #[error("not in any room")]
    NoRoom,
    /// 지정한 방에 요청자가 없음
    #[error("not a member of this room")]
    NotInRoom,
    /// 이미 게임이 진행 중인 방
    #[error("game already in progress")]
    InProgress,
    /// 방장이 아님
    #[error("only the host can do this")]
    NotHost,
    /// 색상을 고르지 않은 플레이어가 있음
    #[error("every player needs a color")]
    ColorNotReady,
    /// 잘못된 색상 형식
    #[error("invalid color")]
    InvalidColor,
    /// 다른 플레이어가 사용 중인 색상
    #[error("color already taken")]
    ColorTaken,
}

impl GameError {
    /// 와이어 포맷의 에러 코드
    pub fn code(self) -> &'static str {
        match self {
            Self::RoomLimit => "ROOM_LIMIT",
            Self::Full => "FULL",
            Self::NotFound => "NOT_FOUND",
            Self::NoRoom => "NO_ROOM",
            Self::NotInRoom => "NOT_IN_ROOM",
            Self::InProgress => "IN_PROGRESS",
            Self::NotHost => "NOT_HOST",
            Self::ColorNotReady => "COLOR_NOT_READY",
            Self::InvalidColor => "INVALID_COLOR",
            Self::ColorTaken => "COLOR_TAKEN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_code_matches_code() {
        for err in [
            GameError::RoomLimit,
            GameError::Full,
            GameError::NotFound,
            GameError::NoRoom,
            GameError::NotInRoom,
            GameError::InProgress,
            GameError::NotHost,
            GameError::ColorNotReady,
            GameError::InvalidColor,
            GameError::ColorTaken,
        ] {
            let json = serde_json::to_value(err).unwrap();
            assert_eq!(json, serde_json::Value::String(err.code().to_string()));
        }
    }
}
