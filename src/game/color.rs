//! 플레이어 색상 배정

use crate::error::GameError;

use super::room::{Roster, Room};

/// 자동 배정 순서대로 나열된 팔레트
pub const PALETTE: [&str; 6] = [
    "#FF4D4D", "#4D7CFF", "#3DDC84", "#FFC93C", "#B45CFF", "#FF8A3D",
];

/// 팔레트가 모두 사용 중일 때의 회색 (미선택으로 취급)
pub const FALLBACK_COLOR: &str = "#9E9E9E";

/// `RRGGBB` / `#RRGGBB` 를 `#RRGGBB` 대문자로 정규화
pub fn normalize_color(raw: &str) -> Option<String> {
    let hex = raw.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", hex.to_ascii_uppercase()))
}

/// 기본값(미지정 또는 회색)이 아닌 색상인지
pub fn is_assigned(color: Option<&str>) -> bool {
    match color {
        Some(c) => !c.eq_ignore_ascii_case(FALLBACK_COLOR),
        None => false,
    }
}

fn is_used(players: &Roster, color: &str, except: Option<&str>) -> bool {
    players
        .iter()
        .filter(|p| Some(p.id.as_str()) != except)
        .filter_map(|p| p.color.as_deref())
        .any(|c| c.eq_ignore_ascii_case(color))
}

/// 아무도 쓰지 않는 첫 팔레트 색상
pub fn pick_first_free_color(players: &Roster) -> String {
    PALETTE
        .iter()
        .find(|c| !is_used(players, c, None))
        .map(|c| (*c).to_string())
        .unwrap_or_else(|| FALLBACK_COLOR.to_string())
}

/// 요청한 색상을 검증 후 적용하고 정규화된 값을 돌려준다
pub fn set_color(room: &mut Room, player_id: &str, requested: &str) -> Result<String, GameError> {
    if !room.players.contains(player_id) {
        return Err(GameError::NotInRoom);
    }
    let color = normalize_color(requested).ok_or(GameError::InvalidColor)?;
    if is_used(&room.players, &color, Some(player_id)) {
        return Err(GameError::ColorTaken);
    }
    if let Some(player) = room.players.get_mut(player_id) {
        player.color = Some(color.clone());
    }
    Ok(color)
}
