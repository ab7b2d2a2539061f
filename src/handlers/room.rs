//! 방 관리 핸들러

use std::sync::Arc;

use crate::error::GameError;
use crate::game::color::{pick_first_free_color, set_color};
use crate::game::room::sanitize_nickname;
use crate::game::team::{pick_team_with_alternation, team_cap};
use crate::game::{now_millis, round, Player, Room, RoomSettings, RoomStatus, Team};
use crate::protocol::{
    AckData, CreateRoomRequest, JoinRoomRequest, Outbox, RoomInfoRequest, SelectRequest,
    ServerMessage, SetColorRequest,
};
use crate::state::AppState;

use super::dispatch;
use super::game::check_round_end;
use super::schedule::schedule_flag_reset;

/// 방 생성 처리
pub fn handle_create_room(
    state: &Arc<AppState>,
    peer_id: &str,
    request: CreateRoomRequest,
) -> Result<AckData, GameError> {
    let settings = RoomSettings::new(
        request.max,
        request.visibility,
        request.room_name.as_deref(),
        request.game_mode.as_deref(),
    );
    let host = Player::new(peer_id, request.nickname.as_deref());

    // 한 번에 한 방에만 있을 수 있다. 생성이 거절되면 지금 방에 그대로 남는다.
    let current = state.room_of(peer_id);
    let view = state
        .rooms
        .create(host, settings, current.as_deref(), || {
            leave_current_room(state, peer_id);
        })
        .map_err(|e| {
            tracing::warn!(peer_id = %peer_id, "Room limit reached, rejected create");
            e
        })?;
    state.set_room_of(peer_id, Some(view.room_id.clone()));

    let out = state.rooms.with_room(&view.room_id, |room| {
        let mut out = Outbox::default();
        out.broadcast(&room.players, ServerMessage::RoomUpdate(room.view()));
        out
    });
    if let Some(out) = out {
        dispatch(state, out);
    }

    tracing::info!(
        peer_id = %peer_id,
        room_id = %view.room_id,
        game_mode = %view.game_mode,
        max = view.max,
        "Room created by host"
    );
    Ok(AckData::Room { room: view })
}

/// 공개 대기방 목록
pub fn handle_list_rooms(state: &Arc<AppState>) -> Result<AckData, GameError> {
    Ok(AckData::Rooms {
        rooms: state.rooms.list(),
    })
}

/// 방 정보 조회
pub fn handle_room_info(
    state: &Arc<AppState>,
    request: RoomInfoRequest,
) -> Result<AckData, GameError> {
    let room = state
        .rooms
        .view(request.room_id.trim())
        .ok_or(GameError::NotFound)?;
    Ok(AckData::Room { room })
}

/// 새로 들어올 수 있는 방인지만 확인한다. 방 상태는 바꾸지 않는다.
fn check_admission(room: &Room, peer_id: &str) -> Result<(), GameError> {
    if room.players.contains(peer_id) {
        return Ok(());
    }
    if room.status == RoomStatus::Playing {
        return Err(GameError::InProgress);
    }
    if room.is_full() {
        return Err(GameError::Full);
    }
    if room.is_team_mode() {
        let cap = team_cap(room.max);
        if [Team::A, Team::B].iter().all(|team| room.team_count(*team) >= cap) {
            return Err(GameError::Full);
        }
    }
    Ok(())
}

/// 입장 조건 확인 후 플레이어를 방에 넣는다. 같은 연결로 이미 있으면 기존 기록 유지.
fn admit(room: &mut Room, peer_id: &str, nickname: Option<&str>) -> Result<Player, GameError> {
    if let Some(existing) = room.players.get_mut(peer_id) {
        if nickname.is_some() {
            existing.nickname = sanitize_nickname(nickname);
        }
        return Ok(existing.clone());
    }
    check_admission(room, peer_id)?;

    let mut player = Player::new(peer_id, nickname);
    if room.is_team_mode() {
        let cap = team_cap(room.max);
        player.team = Some(pick_team_with_alternation(room, cap).ok_or(GameError::Full)?);
    }
    player.color = Some(pick_first_free_color(&room.players));
    room.players.insert(player.clone());
    Ok(player)
}

/// 방 참여 처리
pub fn handle_join_room(
    state: &Arc<AppState>,
    peer_id: &str,
    request: JoinRoomRequest,
) -> Result<AckData, GameError> {
    let room_id = request.room_id.trim().to_string();

    tracing::info!(peer_id = %peer_id, room_id = %room_id, "handle_join_room started");

    if !state.rooms.contains(&room_id) {
        return Err(GameError::NotFound);
    }
    if state.room_of(peer_id).is_some_and(|current| current != room_id) {
        // 받아줄 방인지 먼저 보고 나서야 지금 방을 떠난다
        state
            .rooms
            .with_room(&room_id, |room| check_admission(room, peer_id))
            .ok_or(GameError::NotFound)?
            .map_err(|e| {
                tracing::warn!(peer_id = %peer_id, room_id = %room_id, error = %e, "Join rejected");
                e
            })?;
        leave_current_room(state, peer_id);
    }

    let (view, out) = state
        .rooms
        .with_room(&room_id, |room| -> Result<_, GameError> {
            let rejoin = room.players.contains(peer_id);
            let player = admit(room, peer_id, request.nickname.as_deref())?;
            let mut out = Outbox::default();
            if !rejoin {
                out.broadcast_except(&room.players, peer_id, ServerMessage::PlayerJoined { player });
            }
            let view = room.view();
            out.broadcast(&room.players, ServerMessage::RoomUpdate(view.clone()));
            Ok((view, out))
        })
        .ok_or(GameError::NotFound)?
        .map_err(|e| {
            tracing::warn!(peer_id = %peer_id, room_id = %room_id, error = %e, "Join rejected");
            e
        })?;

    state.set_room_of(peer_id, Some(room_id.clone()));
    dispatch(state, out);

    tracing::info!(
        peer_id = %peer_id,
        room_id = %room_id,
        user_count = view.players.len(),
        "User joined room"
    );
    Ok(AckData::Room { room: view })
}

/// 방 나가기 내부 로직. 마지막 사람이 나가면 방을 삭제한다.
pub fn leave_room_internal(state: &Arc<AppState>, peer_id: &str, room_id: &str) -> bool {
    let result = state.rooms.with_room(room_id, |room| {
        let mut out = Outbox::default();
        if room.players.remove(peer_id).is_none() {
            return (false, out);
        }
        room.effects.cancel_target(peer_id);

        if room.players.is_empty() {
            // 남은 사람이 없으니 나가는 사람에게만 알린다
            out.send(
                peer_id,
                ServerMessage::RoomClosed {
                    room_id: room.id.clone(),
                },
            );
            return (true, out);
        }

        if room.host_id == peer_id {
            if let Some(next_host) = room.players.first() {
                room.host_id = next_host.id.clone();
                tracing::info!(room_id = %room.id, host_id = %room.host_id, "Host reassigned");
            }
        }

        // 남은 인원으로 라운드 / 증강 선택이 끝날 수 있다
        if room.status == RoomStatus::Playing {
            check_round_end(state, room);
            let round = room.current_round;
            if round::try_complete_augments(room, round, now_millis(), &mut out) {
                schedule_flag_reset(state, room, round);
            }
        }

        out.broadcast(
            &room.players,
            ServerMessage::PlayerLeft {
                id: peer_id.to_string(),
                room_id: room.id.clone(),
            },
        );
        out.broadcast(&room.players, ServerMessage::RoomUpdate(room.view()));

        tracing::info!(
            peer_id = %peer_id,
            room_id = %room_id,
            remaining = room.players.len(),
            "User left room"
        );
        (true, out)
    });

    let Some((left, out)) = result else {
        return false;
    };
    dispatch(state, out);
    state.rooms.destroy(room_id);
    left
}

fn leave_current_room(state: &Arc<AppState>, peer_id: &str) -> Vec<String> {
    let Some(room_id) = state.room_of(peer_id) else {
        return Vec::new();
    };
    state.set_room_of(peer_id, None);
    if leave_room_internal(state, peer_id, &room_id) {
        vec![room_id]
    } else {
        Vec::new()
    }
}

/// 방 나가기 처리
pub fn handle_leave_room(state: &Arc<AppState>, peer_id: &str) -> Result<AckData, GameError> {
    let left = leave_current_room(state, peer_id);
    Ok(AckData::Left { left })
}

/// 준비 상태 토글
pub fn handle_ready(state: &Arc<AppState>, peer_id: &str) -> Result<AckData, GameError> {
    let room_id = state.room_of(peer_id).ok_or(GameError::NoRoom)?;

    let (ready, out) = state
        .rooms
        .with_room(&room_id, |room| -> Result<_, GameError> {
            let player = room.players.get_mut(peer_id).ok_or(GameError::NotInRoom)?;
            player.ready = !player.ready;
            let ready = player.ready;
            let player = player.clone();

            let mut out = Outbox::default();
            out.broadcast(&room.players, ServerMessage::PlayerUpdated { player });
            out.broadcast(&room.players, ServerMessage::RoomUpdate(room.view()));
            if room.players.len() >= 2 && room.players.iter().all(|p| p.ready) {
                out.broadcast(
                    &room.players,
                    ServerMessage::ReadyToStart {
                        room_id: room.id.clone(),
                    },
                );
            }
            Ok((ready, out))
        })
        .ok_or(GameError::NoRoom)??;

    dispatch(state, out);
    Ok(AckData::Ready { ready })
}

/// 팀 / 색상 선택
pub fn handle_select(
    state: &Arc<AppState>,
    peer_id: &str,
    request: SelectRequest,
) -> Result<AckData, GameError> {
    let room_id = state.room_of(peer_id).ok_or(GameError::NoRoom)?;

    let out = state
        .rooms
        .with_room(&room_id, |room| -> Result<_, GameError> {
            let current = room.players.get(peer_id).ok_or(GameError::NotInRoom)?.team;
            if let Some(team) = request.team {
                validate_team_switch(room, current, team)?;
            }
            if let Some(color) = request.color.as_deref() {
                set_color(room, peer_id, color)?;
            }
            if let Some(team) = request.team {
                if let Some(player) = room.players.get_mut(peer_id) {
                    player.team = Some(team);
                }
            }
            Ok(player_updated(room, peer_id))
        })
        .ok_or(GameError::NoRoom)??;

    dispatch(state, out);
    Ok(AckData::Empty {})
}

fn validate_team_switch(room: &Room, current: Option<Team>, team: Team) -> Result<(), GameError> {
    if current == Some(team) || !room.is_team_mode() {
        return Ok(());
    }
    if room.team_count(team) >= team_cap(room.max) {
        return Err(GameError::Full);
    }
    Ok(())
}

/// 색상 지정
pub fn handle_set_color(
    state: &Arc<AppState>,
    peer_id: &str,
    request: SetColorRequest,
) -> Result<AckData, GameError> {
    let room_id = match request.room_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => state.room_of(peer_id).ok_or(GameError::NoRoom)?,
    };

    let out = state
        .rooms
        .with_room(&room_id, |room| -> Result<_, GameError> {
            let color = set_color(room, peer_id, &request.color)?;
            tracing::debug!(peer_id = %peer_id, room_id = %room.id, color = %color, "Color set");
            Ok(player_updated(room, peer_id))
        })
        .ok_or(GameError::NoRoom)??;

    dispatch(state, out);
    Ok(AckData::Empty {})
}

fn player_updated(room: &Room, peer_id: &str) -> Outbox {
    let mut out = Outbox::default();
    if let Some(player) = room.players.get(peer_id) {
        out.broadcast(
            &room.players,
            ServerMessage::PlayerUpdated {
                player: player.clone(),
            },
        );
    }
    out.broadcast(&room.players, ServerMessage::RoomUpdate(room.view()));
    out
}
