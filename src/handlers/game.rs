//! 매치 진행 핸들러

use std::sync::Arc;

use serde_json::Value;

use crate::error::GameError;
use crate::game::{augment, now_millis, round, Room, RoomStatus};
use crate::protocol::{
    AckData, AugmentSelectRequest, BulletHitRequest, GameEvent, Outbox, ServerMessage,
};
use crate::state::AppState;

use super::dispatch;
use super::schedule::{
    commit_round, schedule_damage_over_time, schedule_flag_reset, schedule_round_commit,
};

/// 게임 시작 (방장 전용)
pub fn handle_start_game(state: &Arc<AppState>, peer_id: &str) -> Result<AckData, GameError> {
    let room_id = state.room_of(peer_id).ok_or(GameError::NoRoom)?;

    let out = state
        .rooms
        .with_room(&room_id, |room| -> Result<Outbox, GameError> {
            round::check_start(room, peer_id)?;
            let mut out = Outbox::default();
            round::start_match(room, &mut out);
            out.broadcast(&room.players, ServerMessage::RoomUpdate(room.view()));
            Ok(out)
        })
        .ok_or(GameError::NoRoom)??;

    dispatch(state, out);
    tracing::info!(peer_id = %peer_id, room_id = %room_id, "Game started");
    Ok(AckData::Empty {})
}

/// 쓰러진 플레이어 공지 + 라운드 종료 판정
pub fn announce_death(
    state: &Arc<AppState>,
    room: &mut Room,
    target_id: &str,
    killer_id: Option<&str>,
    out: &mut Outbox,
) {
    out.broadcast(
        &room.players,
        ServerMessage::event(GameEvent::Dead {
            player_id: target_id.to_string(),
            killer_id: killer_id.map(str::to_string),
        }),
    );
    room.effects.cancel_target(target_id);
    tracing::info!(room_id = %room.id, target = %target_id, killer = ?killer_id, "Player down");
    check_round_end(state, room);
}

/// 라운드가 끝났으면 결과 확정을 예약한다 (이미 예약되어 있으면 무시)
pub fn check_round_end(state: &Arc<AppState>, room: &mut Room) {
    if let Some(winners) = round::begin_round_end(room) {
        schedule_round_commit(state, room, winners);
    }
}

/// 명중 처리: 체력 감소, 증강 효과, 사망/라운드 판정, 원본 payload 중계
pub fn handle_bullet_hit(state: &Arc<AppState>, shooter_id: &str, raw: Value) {
    let request: BulletHitRequest = match serde_json::from_value(raw.clone()) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(peer_id = %shooter_id, error = %e, "Malformed bullet hit");
            return;
        }
    };
    let Some(room_id) = request.room_id.filter(|id| !id.is_empty()) else {
        tracing::debug!(peer_id = %shooter_id, "Bullet hit without room id");
        return;
    };
    let damage = request
        .hit
        .as_ref()
        .and_then(|hit| hit.damage)
        .map(|d| d.round() as i32)
        .unwrap_or(state.config.game.bullet_damage);

    let out = state.rooms.with_room(&room_id, |room| {
        let mut out = Outbox::default();
        if !room.players.contains(shooter_id) {
            return out;
        }
        if let Some(target_id) = request.player_id.as_deref() {
            apply_hit(state, room, shooter_id, target_id, damage, &mut out);
        }
        out.broadcast_except(&room.players, shooter_id, ServerMessage::BulletHit(raw));
        out
    });

    if let Some(out) = out {
        dispatch(state, out);
    }
}

fn apply_hit(
    state: &Arc<AppState>,
    room: &mut Room,
    shooter_id: &str,
    target_id: &str,
    damage: i32,
    out: &mut Outbox,
) {
    let Some(hit) = round::apply_damage(room, target_id, damage) else {
        return;
    };

    out.broadcast(
        &room.players,
        ServerMessage::HealthUpdate {
            player_id: target_id.to_string(),
            health: hit.health,
        },
    );
    out.broadcast(
        &room.players,
        ServerMessage::event(GameEvent::ShowHealthBar {
            player_id: target_id.to_string(),
            health: hit.health,
        }),
    );

    let dots = augment::apply_on_hit(room, shooter_id, target_id, hit.dealt, hit.died, out);
    for request in dots {
        schedule_damage_over_time(state, room, shooter_id, target_id, request);
    }

    if hit.died {
        announce_death(state, room, target_id, Some(shooter_id), out);
    }
}

/// 수동 라운드 종료. 대기 중인 확정이 없을 때만 즉시 확정한다.
pub fn handle_round_end(state: &Arc<AppState>, peer_id: &str) -> Result<AckData, GameError> {
    let room_id = state.room_of(peer_id).ok_or(GameError::NoRoom)?;

    let out = state
        .rooms
        .with_room(&room_id, |room| {
            let mut out = Outbox::default();
            if room.status != RoomStatus::Playing || room.is_round_ending {
                tracing::debug!(room_id = %room.id, "Manual round end ignored");
                return out;
            }
            room.is_round_ending = true;
            let winners = room.alive_ids();
            commit_round(state, room, &winners, &mut out);
            out
        })
        .ok_or(GameError::NoRoom)?;

    dispatch(state, out);
    Ok(AckData::Empty {})
}

/// 증강 선택. 라운드가 끝난 뒤 다음 라운드가 시작되기 전까지만 받는다.
/// 그 밖의 선택은 기록하지 않고 `allSelected: false` 로 응답한다.
pub fn handle_augment_select(
    state: &Arc<AppState>,
    peer_id: &str,
    request: AugmentSelectRequest,
) -> Result<AckData, GameError> {
    let room_id = state.room_of(peer_id).ok_or(GameError::NoRoom)?;

    let (all_selected, out) = state
        .rooms
        .with_room(&room_id, |room| -> Result<(bool, Outbox), GameError> {
            if !room.players.contains(peer_id) {
                return Err(GameError::NotInRoom);
            }
            let mut out = Outbox::default();
            if room.status != RoomStatus::Playing || !room.is_round_ending {
                tracing::debug!(
                    peer_id = %peer_id,
                    room_id = %room.id,
                    "Augment select outside the augment phase"
                );
                return Ok((false, out));
            }
            let round = request.round.unwrap_or(room.current_round);
            let outcome = round::select_augment(
                room,
                peer_id,
                &request.augment_id,
                round,
                now_millis(),
                &mut out,
            );
            if outcome.completed {
                schedule_flag_reset(state, room, round);
                tracing::info!(room_id = %room.id, round = round, "Augment selection complete");
            }
            Ok((outcome.all_selected, out))
        })
        .ok_or(GameError::NoRoom)??;

    dispatch(state, out);
    Ok(AckData::AllSelected { all_selected })
}
