//! 팀 배정 (번갈아 배정 + 팀 정원)

use super::room::{Room, Team};

/// 팀당 정원: 방 정원의 절반 (홀수면 올림)
pub fn team_cap(max: usize) -> usize {
    max.div_ceil(2)
}

/// `next_team` 부터 시도해 정원이 남은 첫 팀을 돌려준다.
///
/// 성공하면 `next_team` 을 배정된 팀의 반대편으로 돌린다. 두 팀 모두 차 있으면 `None`.
pub fn pick_team_with_alternation(room: &mut Room, cap: usize) -> Option<Team> {
    let first = room.next_team;
    let team = [first, first.other()]
        .into_iter()
        .find(|team| room.team_count(*team) < cap)?;
    room.next_team = team.other();
    Some(team)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::room::{Player, RoomSettings};
    use crate::game::TEAM_MODE;

    fn team_room(max: i64) -> Room {
        Room::new(
            "TEAM01".into(),
            Player::new("host", None),
            RoomSettings::new(Some(max), None, None, Some(TEAM_MODE)),
            0,
        )
    }

    fn join(room: &mut Room, id: &str) -> Option<Team> {
        let cap = team_cap(room.max);
        let team = pick_team_with_alternation(room, cap)?;
        let mut player = Player::new(id, None);
        player.team = Some(team);
        room.players.insert(player);
        Some(team)
    }

    #[test]
    fn cap_rounds_up() {
        assert_eq!(team_cap(4), 2);
        assert_eq!(team_cap(5), 3);
        assert_eq!(team_cap(2), 1);
    }

    #[test]
    fn joiners_alternate_starting_from_b() {
        let mut room = team_room(4);
        assert_eq!(join(&mut room, "p1"), Some(Team::B));
        assert_eq!(join(&mut room, "p2"), Some(Team::A));
        assert_eq!(join(&mut room, "p3"), Some(Team::B));
        assert_eq!(join(&mut room, "p4"), None);
    }

    #[test]
    fn full_preferred_team_falls_through_to_other() {
        let mut room = team_room(4);
        // 방장 외에 A 팀 한 명을 더 넣어 A 를 채운다
        let mut extra = Player::new("extra", None);
        extra.team = Some(Team::A);
        room.players.insert(extra);
        room.next_team = Team::A;

        assert_eq!(join(&mut room, "p1"), Some(Team::B));
        assert_eq!(room.next_team, Team::A);
        assert_eq!(room.team_count(Team::B), 1);
    }
}
