//! 지연 작업 예약
//!
//! 모든 작업은 방 id 와 대상 id 만 들고 있다가, 실행 시점에 레지스트리에서
//! 방을 다시 찾는다. 방이 사라졌거나 대상이 없으면 조용히 끝난다.
//! abort 핸들은 방의 `EffectTable` 에 들어가므로 방이 삭제되면 함께 취소된다.

use std::sync::Arc;
use std::time::Duration;

use crate::game::augment::DotRequest;
use crate::game::effects::{TaskKey, TaskKind};
use crate::game::{round, Room, RoomStatus};
use crate::protocol::{GameEvent, Outbox, ServerMessage};
use crate::state::AppState;

use super::dispatch;
use super::game::announce_death;

/// `delay` 후 방을 다시 잠그고 `task` 실행
pub fn schedule_once<F>(state: &Arc<AppState>, room: &mut Room, key: TaskKey, delay: Duration, task: F)
where
    F: FnOnce(&Arc<AppState>, &mut Room, &mut Outbox) + Send + 'static,
{
    let token = room.effects.reserve();
    let st = Arc::clone(state);
    let room_id = room.id.clone();
    let task_key = key.clone();

    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let outbox = st.rooms.with_room(&room_id, |room| {
            room.effects.finish(&task_key, token);
            let mut out = Outbox::default();
            task(&st, room, &mut out);
            out
        });
        match outbox {
            Some(out) => dispatch(&st, out),
            None => tracing::debug!(room_id = %room_id, "Room gone before scheduled task"),
        }
    });
    room.effects.insert(key, token, handle.abort_handle());
}

/// 라운드 종료 감지 후 결과 확정 예약
pub fn schedule_round_commit(state: &Arc<AppState>, room: &mut Room, winners: Vec<String>) {
    tracing::info!(room_id = %room.id, winners = ?winners, "Round end detected");
    let delay = state.config.game.round_result_delay;
    schedule_once(
        state,
        room,
        TaskKey::room(TaskKind::RoundCommit),
        delay,
        move |state, room, out| commit_round(state, room, &winners, out),
    );
}

/// 라운드 확정 후 다음 단계(증강 선택 또는 최종 결과) 예약
pub fn commit_round(state: &Arc<AppState>, room: &mut Room, winners: &[String], out: &mut Outbox) {
    if room.status != RoomStatus::Playing {
        return;
    }
    let advance = round::advance_round(room, winners, state.config.game.wins_to_finish, out);
    tracing::info!(
        room_id = %room.id,
        round = advance.round,
        finished = advance.finished,
        "Round committed"
    );

    let finished = advance.finished;
    schedule_once(
        state,
        room,
        TaskKey::room(TaskKind::Phase),
        state.config.game.phase_delay,
        move |_, room, out| {
            if room.status != RoomStatus::Playing {
                return;
            }
            if finished {
                round::finish_match(room, out);
                tracing::info!(room_id = %room.id, "Match finished");
            } else {
                round::open_augment_phase(room, out);
            }
        },
    );
}

/// 증강 완료 플래그 해제 예약
pub fn schedule_flag_reset(state: &Arc<AppState>, room: &mut Room, round: u32) {
    schedule_once(
        state,
        room,
        TaskKey::room(TaskKind::AugmentFlagReset(round)),
        state.config.game.augment_flag_reset,
        move |_, room, _| {
            room.selection_mut(round).completion_scheduled = false;
        },
    );
}

/// 도트 데미지 예약. 같은 대상에 같은 증강이 다시 걸리면 처음부터 다시 센다.
pub fn schedule_damage_over_time(
    state: &Arc<AppState>,
    room: &mut Room,
    shooter_id: &str,
    target_id: &str,
    request: DotRequest,
) {
    let key = TaskKey::effect(target_id, request.augment_id);
    let token = room.effects.reserve();
    let st = Arc::clone(state);
    let room_id = room.id.clone();
    let shooter = shooter_id.to_string();
    let target = target_id.to_string();
    let finish_key = key.clone();

    let handle = tokio::spawn(async move {
        let dot = request.dot;
        for _ in 0..dot.ticks {
            tokio::time::sleep(dot.period).await;
            let tick = st.rooms.with_room(&room_id, |room| {
                let mut out = Outbox::default();
                let keep_going = dot_tick(&st, room, &shooter, &target, &request, &mut out);
                (keep_going, out)
            });
            let Some((keep_going, out)) = tick else {
                return;
            };
            dispatch(&st, out);
            if !keep_going {
                break;
            }
        }
        st.rooms
            .with_room(&room_id, |room| room.effects.finish(&finish_key, token));
    });
    room.effects.insert(key, token, handle.abort_handle());
}

/// 도트 한 틱. 계속 진행해도 되면 `true`.
fn dot_tick(
    state: &Arc<AppState>,
    room: &mut Room,
    shooter_id: &str,
    target_id: &str,
    request: &DotRequest,
    out: &mut Outbox,
) -> bool {
    let Some(hit) = round::apply_damage(room, target_id, request.dot.damage) else {
        return false;
    };
    out.broadcast(
        &room.players,
        ServerMessage::HealthUpdate {
            player_id: target_id.to_string(),
            health: hit.health,
        },
    );
    if request.dot.show_health_bar {
        out.broadcast(
            &room.players,
            ServerMessage::event(GameEvent::ShowHealthBar {
                player_id: target_id.to_string(),
                health: hit.health,
            }),
        );
    }
    tracing::debug!(
        room_id = %room.id,
        target = %target_id,
        augment = request.augment_id,
        health = hit.health,
        "Damage over time tick"
    );

    if hit.died {
        announce_death(state, room, target_id, Some(shooter_id), out);
        return false;
    }
    true
}
