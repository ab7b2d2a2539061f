//! 실시간 입력/이벤트 중계 핸들러
//!
//! 중계 이벤트에는 ack 가 없으므로 잘못된 payload 는 조용히 버린다.

use std::sync::Arc;

use serde_json::Value;

use crate::game::{now_millis, Room};
use crate::protocol::{ChatRequest, GameEventPayload, MoveInput, Outbox, ServerMessage, ShootInput};
use crate::state::AppState;

use super::dispatch;

/// 채팅 메시지 최대 길이 (문자 수)
pub const MAX_CHAT_LEN: usize = 200;

/// 보낸 사람이 속한 방에서 `build` 결과를 전송
fn relay_in_own_room<F>(state: &Arc<AppState>, peer_id: &str, build: F)
where
    F: FnOnce(&mut Room, &mut Outbox),
{
    let Some(room_id) = state.room_of(peer_id) else {
        return;
    };
    relay_in_room(state, peer_id, &room_id, build);
}

fn relay_in_room<F>(state: &Arc<AppState>, peer_id: &str, room_id: &str, build: F)
where
    F: FnOnce(&mut Room, &mut Outbox),
{
    let out = state.rooms.with_room(room_id, |room| {
        let mut out = Outbox::default();
        if room.players.contains(peer_id) {
            build(room, &mut out);
        }
        out
    });
    if let Some(out) = out {
        dispatch(state, out);
    }
}

/// 이동 입력: 마지막 위치를 기록하고 다른 사람에게 `state:move`
pub fn handle_move(state: &Arc<AppState>, peer_id: &str, input: MoveInput) {
    relay_in_own_room(state, peer_id, |room, out| {
        if let Some(player) = room.players.get_mut(peer_id) {
            player.x = input.x;
            player.y = input.y;
        }
        out.broadcast_except(
            &room.players,
            peer_id,
            ServerMessage::StateMove {
                id: peer_id.to_string(),
                x: input.x,
                y: input.y,
                vx: input.vx,
                vy: input.vy,
                facing: input.facing,
            },
        );
    });
}

/// 사격 입력
pub fn handle_shoot(state: &Arc<AppState>, peer_id: &str, input: ShootInput) {
    relay_in_own_room(state, peer_id, |room, out| {
        out.broadcast_except(
            &room.players,
            peer_id,
            ServerMessage::StateShoot {
                id: peer_id.to_string(),
                x: input.x,
                y: input.y,
                angle: input.angle,
            },
        );
    });
}

fn payload_room_id(payload: &Value) -> Option<&str> {
    payload
        .get("roomId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// payload 의 `roomId` 방으로 그대로 중계 (보낸 사람 제외)
fn relay_verbatim(state: &Arc<AppState>, peer_id: &str, payload: Value, wrap: fn(Value) -> ServerMessage) {
    let Some(room_id) = payload_room_id(&payload).map(str::to_string) else {
        tracing::debug!(peer_id = %peer_id, "Relay without room id dropped");
        return;
    };
    relay_in_room(state, peer_id, &room_id, |room, out| {
        out.broadcast_except(&room.players, peer_id, wrap(payload));
    });
}

pub fn handle_pose_update(state: &Arc<AppState>, peer_id: &str, payload: Value) {
    relay_verbatim(state, peer_id, payload, ServerMessage::PoseUpdate);
}

pub fn handle_particle_create(state: &Arc<AppState>, peer_id: &str, payload: Value) {
    relay_verbatim(state, peer_id, payload, ServerMessage::ParticleCreate);
}

pub fn handle_game_event(state: &Arc<AppState>, peer_id: &str, payload: Value) {
    relay_verbatim(state, peer_id, payload, |payload| {
        ServerMessage::GameEvent(GameEventPayload::Relayed(payload))
    });
}

/// 채팅: 길이를 자르고 보낸 사람 포함 방 전체에
pub fn handle_chat(state: &Arc<AppState>, peer_id: &str, request: ChatRequest) {
    let message: String = request.message.trim().chars().take(MAX_CHAT_LEN).collect();
    if message.is_empty() {
        return;
    }
    relay_in_own_room(state, peer_id, |room, out| {
        let nickname = room
            .players
            .get(peer_id)
            .map(|p| p.nickname.clone())
            .unwrap_or_default();
        out.broadcast(
            &room.players,
            ServerMessage::ChatMessage {
                id: peer_id.to_string(),
                nickname,
                message,
                at: now_millis(),
            },
        );
    });
}
