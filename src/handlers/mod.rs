//! 핸들러 모듈

pub mod connection;
pub mod game;
pub mod relay;
pub mod room;
pub mod schedule;

pub use connection::*;
pub use game::*;
pub use relay::*;
pub use room::*;

use std::sync::Arc;

use crate::error::GameError;
use crate::protocol::{AckData, ClientMessage, Outbox, ServerMessage};
use crate::state::AppState;

/// 메시지 처리. ack 를 받는 요청이면 결과를 돌려준다.
pub fn handle_client_message(
    state: &Arc<AppState>,
    peer_id: &str,
    msg: ClientMessage,
) -> Option<Result<AckData, GameError>> {
    let result = match msg {
        ClientMessage::CreateRoom(request) => handle_create_room(state, peer_id, request),
        ClientMessage::ListRooms {} => handle_list_rooms(state),
        ClientMessage::RoomInfo(request) => handle_room_info(state, request),
        ClientMessage::JoinRoom(request) => handle_join_room(state, peer_id, request),
        ClientMessage::LeaveRoom {} => handle_leave_room(state, peer_id),
        ClientMessage::Ready {} => handle_ready(state, peer_id),
        ClientMessage::Select(request) => handle_select(state, peer_id, request),
        ClientMessage::SetColor(request) => handle_set_color(state, peer_id, request),
        ClientMessage::StartGame {} => handle_start_game(state, peer_id),
        ClientMessage::RoundEnd(_) => handle_round_end(state, peer_id),
        ClientMessage::AugmentSelect(request) => handle_augment_select(state, peer_id, request),
        ClientMessage::BulletHit(payload) => {
            handle_bullet_hit(state, peer_id, payload);
            return None;
        }
        ClientMessage::Move(input) => {
            handle_move(state, peer_id, input);
            return None;
        }
        ClientMessage::Shoot(input) => {
            handle_shoot(state, peer_id, input);
            return None;
        }
        ClientMessage::PoseUpdate(payload) => {
            handle_pose_update(state, peer_id, payload);
            return None;
        }
        ClientMessage::ParticleCreate(payload) => {
            handle_particle_create(state, peer_id, payload);
            return None;
        }
        ClientMessage::GameEvent(payload) => {
            handle_game_event(state, peer_id, payload);
            return None;
        }
        ClientMessage::ChatSend(request) => {
            handle_chat(state, peer_id, request);
            return None;
        }
    };
    Some(result)
}

/// 쌓아 둔 메시지 전송 (방 잠금을 놓은 뒤 호출)
pub fn dispatch(state: &AppState, outbox: Outbox) {
    for (peer_id, message) in outbox.into_deliveries() {
        send_to_peer(state, &peer_id, message);
    }
}

/// 특정 피어에게 메시지 전송
pub fn send_to_peer(state: &AppState, peer_id: &str, message: ServerMessage) {
    if let Some(session) = state.peers.get(peer_id) {
        if session.sender.send(message).is_err() {
            tracing::debug!(peer_id = %peer_id, "Peer channel closed, dropping message");
        }
    }
}
