//! 매치 진행: 시작 조건, 데미지, 라운드 종료 판정과 확정, 증강 선택 배리어
//!
//! 여기 함수들은 방 하나를 잠근 상태에서 호출되는 순수 상태 전이다.
//! 지연 작업 예약은 호출하는 쪽(`handlers`)이 결과를 보고 결정한다.

use std::collections::{BTreeMap, HashSet};

use crate::error::GameError;
use crate::protocol::{GameEvent, Outbox, ServerMessage};

use super::augment;
use super::room::{ActiveAugment, Room, RoomStatus, RoundResult, RoundStanding};
use super::spawn::{compute_spawn_positions, SpawnPoint};
use super::MAX_HEALTH;

/// `game:start` 가능 여부
pub fn check_start(room: &Room, requester: &str) -> Result<(), GameError> {
    if room.host_id != requester {
        return Err(GameError::NotHost);
    }
    if room.status == RoomStatus::Playing {
        return Err(GameError::InProgress);
    }
    if !room.players.iter().all(|p| p.has_color()) {
        return Err(GameError::ColorNotReady);
    }
    Ok(())
}

/// 매치 시작: 체력 초기화, 스폰 배치, `game:started` 와 체력 이벤트
///
/// 끝난 방에서 다시 시작하면 라운드 기록, 승수, 증강을 모두 비운다.
pub fn start_match(room: &mut Room, out: &mut Outbox) -> Vec<SpawnPoint> {
    if room.status == RoomStatus::Ended {
        room.current_round = 0;
        room.round_results.clear();
        room.augment_selections.clear();
        for player in room.players.iter_mut() {
            player.wins = 0;
            player.augments.clear();
        }
    }
    room.status = RoomStatus::Playing;
    room.is_round_ending = false;
    room.effects.cancel_effects();

    let spawns = compute_spawn_positions(room);
    for spawn in &spawns {
        if let Some(player) = room.players.get_mut(&spawn.player_id) {
            player.health = MAX_HEALTH;
            player.x = spawn.x;
            player.y = spawn.y;
        }
    }

    out.broadcast(
        &room.players,
        ServerMessage::GameStarted {
            room_id: room.id.clone(),
            players: room.players.to_vec(),
            spawns: spawns.clone(),
        },
    );
    for player in room.players.iter() {
        out.broadcast(
            &room.players,
            ServerMessage::HealthUpdate {
                player_id: player.id.clone(),
                health: player.health,
            },
        );
    }
    spawns
}

/// 데미지 적용 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    pub health: i32,
    /// 실제로 깎인 체력
    pub dealt: i32,
    /// 이번 데미지로 0 이 되었는지
    pub died: bool,
}

/// 대상 체력 감소. 대상이 없거나 이미 쓰러져 있으면 `None`.
pub fn apply_damage(room: &mut Room, target_id: &str, damage: i32) -> Option<DamageOutcome> {
    let player = room.players.get_mut(target_id)?;
    if !player.is_alive() {
        return None;
    }
    let before = player.health;
    player.health = (before - damage.max(0)).max(0);
    Some(DamageOutcome {
        health: player.health,
        dealt: before - player.health,
        died: player.health == 0,
    })
}

/// 라운드 종료 판정 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundEval {
    pub should_end: bool,
    pub winners: Vec<String>,
}

/// 생존자가 1명 이하이거나 생존자가 모두 같은 팀 값을 가지면 라운드 종료.
/// 개인전은 전원이 같은 팀 값이므로 첫 사망에서 끝난다.
/// 승자는 판정 시점의 생존자 전원.
pub fn evaluate_round_end(room: &Room) -> RoundEval {
    let alive: Vec<_> = room.players.iter().filter(|p| p.is_alive()).collect();
    let one_team_left = alive.iter().map(|p| p.team).collect::<HashSet<_>>().len() <= 1;

    RoundEval {
        should_end: alive.len() <= 1 || one_team_left,
        winners: alive.iter().map(|p| p.id.clone()).collect(),
    }
}

/// 진행 중이고 확정 대기 중인 라운드가 없을 때만 종료를 시작한다.
/// 시작했다면 승자 목록을 돌려주며, 호출자는 확정 작업을 예약해야 한다.
pub fn begin_round_end(room: &mut Room) -> Option<Vec<String>> {
    if room.status != RoomStatus::Playing || room.is_round_ending {
        return None;
    }
    let eval = evaluate_round_end(room);
    if !eval.should_end {
        return None;
    }
    room.is_round_ending = true;
    Some(eval.winners)
}

/// 라운드 확정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundAdvance {
    pub round: u32,
    /// 누군가 최종 승리 조건을 채웠는지
    pub finished: bool,
}

/// 라운드를 하나 진행시킨다: 라운드 번호 +1, 승자 승수 +1, 결과 기록과 `round:result`.
///
/// 자동 판정과 수동 `round:end` 모두 이 함수 하나를 거친다.
pub fn advance_round(
    room: &mut Room,
    winners: &[String],
    wins_to_finish: u32,
    out: &mut Outbox,
) -> RoundAdvance {
    room.current_round += 1;
    let round = room.current_round;

    let winners: Vec<String> = winners
        .iter()
        .filter(|id| room.players.contains(id))
        .cloned()
        .collect();
    for player in room.players.iter_mut() {
        if winners.contains(&player.id) {
            player.wins += 1;
        }
    }

    let standings: Vec<RoundStanding> = room.players.iter().map(RoundStanding::from).collect();
    room.round_results.push(RoundResult {
        round,
        players: standings.clone(),
    });
    out.broadcast(
        &room.players,
        ServerMessage::RoundResult {
            round,
            winners,
            players: standings,
        },
    );

    RoundAdvance {
        round,
        finished: room.players.iter().any(|p| p.wins >= wins_to_finish),
    }
}

/// 다음 증강 선택 단계 공지
pub fn open_augment_phase(room: &Room, out: &mut Outbox) {
    out.broadcast(
        &room.players,
        ServerMessage::RoundAugment {
            round: room.current_round,
            choices: augment::choices(),
        },
    );
}

/// 매치 종료: 상태를 `ended` 로 두고 `game:final`
pub fn finish_match(room: &mut Room, out: &mut Outbox) {
    room.status = RoomStatus::Ended;
    room.effects.cancel_effects();

    let mut standings: Vec<RoundStanding> = room.players.iter().map(RoundStanding::from).collect();
    standings.sort_by(|a, b| b.wins.cmp(&a.wins));
    let top = standings.first().map(|s| s.wins).unwrap_or_default();
    let winner_ids = standings
        .iter()
        .filter(|s| s.wins == top)
        .map(|s| s.id.clone())
        .collect();

    out.broadcast(
        &room.players,
        ServerMessage::GameFinal {
            room_id: room.id.clone(),
            winner_ids,
            standings,
        },
    );
}

/// 증강 선택 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOutcome {
    pub all_selected: bool,
    /// 이번 선택으로 배리어가 완료되었는지 (플래그 해제 예약 필요)
    pub completed: bool,
}

fn count_selected(room: &Room, round: u32) -> usize {
    room.selection(round)
        .map(|r| room.players.ids().filter(|id| r.selections.contains_key(*id)).count())
        .unwrap_or_default()
}

/// 증강 선택 기록. 현재 구성원 전원이 고르면 완료 처리까지 진행한다.
///
/// 이미 완료된 라운드에 늦게 도착한 선택은 아무 이벤트도 만들지 않는다.
pub fn select_augment(
    room: &mut Room,
    player_id: &str,
    augment_id: &str,
    round: u32,
    now: u64,
    out: &mut Outbox,
) -> SelectOutcome {
    {
        let record = room.selection_mut(round);
        if record.completed {
            return SelectOutcome {
                all_selected: true,
                completed: false,
            };
        }
        record
            .selections
            .insert(player_id.to_string(), augment_id.to_string());
    }

    let selected = count_selected(room, round);
    let total = room.players.len();
    out.broadcast(
        &room.players,
        ServerMessage::AugmentProgress {
            round,
            player_id: player_id.to_string(),
            selected,
            total,
        },
    );

    let completed = try_complete_augments(room, round, now, out);
    SelectOutcome {
        all_selected: selected == total,
        completed,
    }
}

/// 현재 구성원 전원이 골랐고 아직 완료되지 않았다면 완료 처리.
/// 플레이어가 나가면서 조건이 채워지는 경우에도 호출된다.
pub fn try_complete_augments(room: &mut Room, round: u32, now: u64, out: &mut Outbox) -> bool {
    let Some(record) = room.selection(round) else {
        return false;
    };
    if record.completed || record.completion_scheduled || room.players.is_empty() {
        return false;
    }
    if !room.players.ids().all(|id| record.selections.contains_key(id)) {
        return false;
    }

    let selections = {
        let record = room.selection_mut(round);
        record.completion_scheduled = true;
        record.completed = true;
        record.selections.clone()
    };

    out.broadcast(
        &room.players,
        ServerMessage::AugmentComplete {
            round,
            selections: selections.clone(),
        },
    );

    for (player_id, augment_id) in &selections {
        if let Some(player) = room.players.get_mut(player_id) {
            player.augments.insert(
                augment_id.clone(),
                ActiveAugment {
                    id: augment_id.clone(),
                    started_at: now,
                },
            );
        }
    }
    let augments: BTreeMap<_, _> = room
        .players
        .iter()
        .map(|p| (p.id.clone(), p.augments.clone()))
        .collect();
    out.broadcast(&room.players, ServerMessage::AugmentSnapshot { augments });

    respawn_all(room, out);
    room.selection_mut(round).selections.clear();
    true
}

/// 다음 라운드 시작: 체력 100, 스폰 재배치, `respawnAll` / `alive`
pub fn respawn_all(room: &mut Room, out: &mut Outbox) {
    room.effects.cancel_effects();
    room.is_round_ending = false;

    for player in room.players.iter_mut() {
        player.health = MAX_HEALTH;
    }
    for player in room.players.iter() {
        out.broadcast(
            &room.players,
            ServerMessage::HealthUpdate {
                player_id: player.id.clone(),
                health: player.health,
            },
        );
    }

    let spawns = compute_spawn_positions(room);
    for spawn in &spawns {
        if let Some(player) = room.players.get_mut(&spawn.player_id) {
            player.x = spawn.x;
            player.y = spawn.y;
        }
        out.broadcast(
            &room.players,
            ServerMessage::event(GameEvent::RespawnAll {
                player_id: spawn.player_id.clone(),
                spawn_index: spawn.spawn_index,
                x: spawn.x,
                y: spawn.y,
            }),
        );
    }
    for id in room.players.ids() {
        out.broadcast(
            &room.players,
            ServerMessage::event(GameEvent::Alive {
                player_id: id.to_string(),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::color::{pick_first_free_color, FALLBACK_COLOR};
    use crate::game::room::{Player, RoomSettings, Team};
    use crate::game::TEAM_MODE;

    fn room_with(ids: &[&str], mode: Option<&str>) -> Room {
        let mut room = Room::new(
            "MATCH1".into(),
            Player::new(ids[0], None),
            RoomSettings::new(Some(8), None, None, mode),
            0,
        );
        for id in &ids[1..] {
            let mut player = Player::new(*id, None);
            player.color = Some(pick_first_free_color(&room.players));
            room.players.insert(player);
        }
        room
    }

    fn playing(ids: &[&str]) -> Room {
        let mut room = room_with(ids, None);
        start_match(&mut room, &mut Outbox::default());
        room
    }

    #[test]
    fn start_gate_checks_host_then_colors() {
        let mut room = room_with(&["host", "guest"], None);
        assert_eq!(check_start(&room, "guest"), Err(GameError::NotHost));

        room.players.get_mut("guest").unwrap().color = Some(FALLBACK_COLOR.into());
        assert_eq!(check_start(&room, "host"), Err(GameError::ColorNotReady));

        room.players.get_mut("guest").unwrap().color = Some("#123456".into());
        assert_eq!(check_start(&room, "host"), Ok(()));

        start_match(&mut room, &mut Outbox::default());
        assert_eq!(room.status, RoomStatus::Playing);
        assert_eq!(check_start(&room, "host"), Err(GameError::InProgress));
    }

    #[test]
    fn ended_match_can_start_again_from_scratch() {
        let mut room = playing(&["a", "b"]);
        advance_round(&mut room, &["a".to_string()], 1, &mut Outbox::default());
        select_augment(&mut room, "a", "poison", 1, 0, &mut Outbox::default());
        room.is_round_ending = true;
        finish_match(&mut room, &mut Outbox::default());
        assert_eq!(check_start(&room, "a"), Ok(()));

        start_match(&mut room, &mut Outbox::default());
        assert_eq!(room.status, RoomStatus::Playing);
        assert_eq!(room.current_round, 0);
        assert!(room.round_results.is_empty());
        assert!(room.augment_selections.is_empty());
        assert!(!room.is_round_ending);
        let a = room.players.get("a").unwrap();
        assert_eq!(a.wins, 0);
        assert!(a.augments.is_empty());
    }

    #[test]
    fn start_places_players_and_announces_health() {
        let mut room = room_with(&["host", "guest"], None);
        let mut out = Outbox::default();
        let spawns = start_match(&mut room, &mut out);
        assert_eq!(spawns.len(), 2);
        assert_eq!(room.players.get("guest").unwrap().x, spawns[1].x);

        let health_updates = out
            .messages()
            .filter(|m| matches!(m, ServerMessage::HealthUpdate { health: 100, .. }))
            .count();
        // 2명에게 2명분
        assert_eq!(health_updates, 4);
    }

    #[test]
    fn damage_clamps_at_zero_and_ignores_the_dead() {
        let mut room = playing(&["a", "b"]);
        let hit = apply_damage(&mut room, "b", 25).unwrap();
        assert_eq!(hit, DamageOutcome { health: 75, dealt: 25, died: false });

        apply_damage(&mut room, "b", 50);
        let hit = apply_damage(&mut room, "b", 40).unwrap();
        assert_eq!(hit, DamageOutcome { health: 0, dealt: 25, died: true });

        assert_eq!(apply_damage(&mut room, "b", 10), None);
        assert_eq!(apply_damage(&mut room, "ghost", 10), None);
        assert_eq!(room.players.get("b").unwrap().health, 0);
    }

    #[test]
    fn negative_damage_does_not_heal() {
        let mut room = playing(&["a", "b"]);
        let hit = apply_damage(&mut room, "b", -30).unwrap();
        assert_eq!(hit.health, 100);
    }

    #[test]
    fn sole_survivor_ends_the_round() {
        let mut room = playing(&["a", "b"]);
        assert!(!evaluate_round_end(&room).should_end);

        room.players.get_mut("a").unwrap().health = 0;
        let eval = evaluate_round_end(&room);
        assert!(eval.should_end);
        assert_eq!(eval.winners, vec!["b".to_string()]);
    }

    #[test]
    fn free_for_all_round_ends_at_first_death() {
        let mut room = playing(&["a", "b", "c"]);
        room.players.get_mut("a").unwrap().health = 0;
        let eval = evaluate_round_end(&room);
        assert!(eval.should_end);
        assert_eq!(eval.winners, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn last_team_standing_ends_team_round() {
        let mut room = room_with(&["a1", "b1", "a2", "b2"], Some(TEAM_MODE));
        for (id, team) in [("a1", Team::A), ("b1", Team::B), ("a2", Team::A), ("b2", Team::B)] {
            room.players.get_mut(id).unwrap().team = Some(team);
        }
        start_match(&mut room, &mut Outbox::default());

        room.players.get_mut("b1").unwrap().health = 0;
        assert!(!evaluate_round_end(&room).should_end);
        room.players.get_mut("b2").unwrap().health = 0;
        let eval = evaluate_round_end(&room);
        assert!(eval.should_end);
        assert_eq!(eval.winners, vec!["a1".to_string(), "a2".to_string()]);
    }

    #[test]
    fn round_end_is_started_only_once() {
        let mut room = playing(&["a", "b"]);
        room.players.get_mut("b").unwrap().health = 0;
        assert_eq!(begin_round_end(&mut room), Some(vec!["a".to_string()]));
        assert_eq!(begin_round_end(&mut room), None);
    }

    #[test]
    fn round_end_needs_a_running_match() {
        let mut room = room_with(&["a", "b"], None);
        room.players.get_mut("b").unwrap().health = 0;
        assert_eq!(begin_round_end(&mut room), None);
    }

    #[test]
    fn advance_round_counts_wins_and_records_history() {
        let mut room = playing(&["a", "b"]);
        let mut out = Outbox::default();
        let first = advance_round(&mut room, &["a".to_string()], 2, &mut out);
        assert_eq!(first, RoundAdvance { round: 1, finished: false });
        let second = advance_round(&mut room, &["a".to_string(), "gone".to_string()], 2, &mut out);
        assert_eq!(second, RoundAdvance { round: 2, finished: true });

        assert_eq!(room.current_round, 2);
        assert_eq!(room.round_results.len(), 2);
        assert_eq!(room.players.get("a").unwrap().wins, 2);
        assert_eq!(room.players.get("b").unwrap().wins, 0);
        assert_eq!(room.round_results[0].players[0].wins, 1);
    }

    #[test]
    fn finish_match_sets_ended_and_names_the_leader() {
        let mut room = playing(&["a", "b"]);
        room.players.get_mut("b").unwrap().wins = 5;
        let mut out = Outbox::default();
        finish_match(&mut room, &mut out);
        assert_eq!(room.status, RoomStatus::Ended);
        assert!(out.messages().any(|m| matches!(
            m,
            ServerMessage::GameFinal { winner_ids, .. } if winner_ids == &vec!["b".to_string()]
        )));
    }

    #[test]
    fn augment_barrier_completes_once() {
        let mut room = playing(&["a", "b"]);
        room.players.get_mut("b").unwrap().health = 0;
        room.is_round_ending = true;
        advance_round(&mut room, &["a".to_string()], 5, &mut Outbox::default());

        let mut out = Outbox::default();
        let first = select_augment(&mut room, "a", "poison", 1, 10, &mut out);
        assert_eq!(first, SelectOutcome { all_selected: false, completed: false });

        let second = select_augment(&mut room, "b", "vampire", 1, 10, &mut out);
        assert_eq!(second, SelectOutcome { all_selected: true, completed: true });
        assert_eq!(room.players.get("b").unwrap().health, MAX_HEALTH);
        assert!(room.players.get("a").unwrap().augments.contains_key("poison"));
        assert!(!room.is_round_ending);
        assert!(room.selection(1).unwrap().selections.is_empty());

        // 플래그가 해제된 뒤 늦게 온 선택도 다시 완료시키지 않는다
        room.selection_mut(1).completion_scheduled = false;
        let mut late = Outbox::default();
        let third = select_augment(&mut room, "a", "burn", 1, 20, &mut late);
        assert_eq!(third, SelectOutcome { all_selected: true, completed: false });
        assert!(late.into_deliveries().is_empty());
        assert!(!room.players.get("a").unwrap().augments.contains_key("burn"));
    }

    #[test]
    fn augments_merge_across_rounds() {
        let mut room = playing(&["a", "b"]);
        for (round, pick) in [(1, "poison"), (2, "frost")] {
            let mut out = Outbox::default();
            select_augment(&mut room, "a", pick, round, 0, &mut out);
            select_augment(&mut room, "b", pick, round, 0, &mut out);
        }
        let augments = &room.players.get("a").unwrap().augments;
        assert_eq!(augments.keys().collect::<Vec<_>>(), vec!["frost", "poison"]);
    }

    #[test]
    fn departure_can_complete_the_barrier() {
        let mut room = playing(&["a", "b"]);
        let mut out = Outbox::default();
        select_augment(&mut room, "a", "shock", 1, 0, &mut out);
        room.players.remove("b");
        assert!(try_complete_augments(&mut room, 1, 0, &mut out));
        assert!(room.players.get("a").unwrap().augments.contains_key("shock"));
    }
}
