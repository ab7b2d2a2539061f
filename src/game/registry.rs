//! 프로세스 전역 방 레지스트리
//!
//! 방마다 DashMap 엔트리 잠금 하나로 직렬화된다. `with_room` 안의 클로저는
//! 동기 코드만 실행해야 하며 그 안에서 레지스트리를 다시 잠그면 안 된다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;
use rand::Rng;

use crate::error::GameError;

use super::room::{Player, Room, RoomSettings, RoomStatus, RoomSummary, RoomView, Visibility};

/// 방 목록에 보여주는 최대 개수
pub const LIST_LIMIT: usize = 3;

/// 방 코드 길이
pub const ROOM_CODE_LEN: usize = 6;

/// 헷갈리는 글자(0/O, 1/I)를 뺀 방 코드 문자
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub struct RoomRegistry {
    rooms: DashMap<String, Room>,
    max_rooms: usize,
    /// 개수 확인과 삽입을 한 번에 하기 위한 생성 잠금
    create_lock: Mutex<()>,
    seq: AtomicU64,
}

impl RoomRegistry {
    pub fn new(max_rooms: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            max_rooms,
            create_lock: Mutex::new(()),
            seq: AtomicU64::new(0),
        }
    }

    /// 방 생성. 한도에 도달했으면 `RoomLimit` 이고 아무것도 바뀌지 않는다.
    ///
    /// `vacate` 는 요청자가 지금 있는 방(`leaving`)을 떠나는 작업으로, 한도 확인을
    /// 통과한 뒤에만 생성 잠금 안에서 실행된다. 그 방에 요청자 혼자 있으면 떠나면서
    /// 자리가 하나 비는 것으로 계산한다.
    pub fn create(
        &self,
        host: Player,
        settings: RoomSettings,
        leaving: Option<&str>,
        vacate: impl FnOnce(),
    ) -> Result<RoomView, GameError> {
        let _guard = self.create_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let freed = leaving.is_some_and(|id| {
            self.rooms
                .get(id)
                .is_some_and(|room| room.players.len() == 1 && room.players.contains(&host.id))
        });
        if self.rooms.len().saturating_sub(usize::from(freed)) >= self.max_rooms {
            return Err(GameError::RoomLimit);
        }
        vacate();
        // 떠나는 사이 누가 들어와 방이 남았으면 여기서 걸린다
        if self.rooms.len() >= self.max_rooms {
            return Err(GameError::RoomLimit);
        }

        let room_id = loop {
            let code = generate_room_code();
            if !self.rooms.contains_key(&code) {
                break code;
            }
        };
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let room = Room::new(room_id.clone(), host, settings, seq);
        let view = room.view();
        self.rooms.insert(room_id.clone(), room);

        tracing::info!(room_id = %room_id, rooms = self.rooms.len(), "Room created");
        Ok(view)
    }

    /// 방 하나를 잠그고 클로저 실행. 방이 없으면 `None`.
    pub fn with_room<R>(&self, room_id: &str, f: impl FnOnce(&mut Room) -> R) -> Option<R> {
        let mut room = self.rooms.get_mut(room_id)?;
        Some(f(&mut room))
    }

    pub fn view(&self, room_id: &str) -> Option<RoomView> {
        self.rooms.get(room_id).map(|room| room.view())
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// 빈 방 삭제. 플레이어가 남아 있으면 그대로 둔다.
    /// 남아 있던 예약 작업은 방과 함께 취소된다.
    pub fn destroy(&self, room_id: &str) -> bool {
        let removed = self
            .rooms
            .remove_if(room_id, |_, room| room.players.is_empty())
            .is_some();
        if removed {
            tracing::info!(room_id = %room_id, "Room deleted");
        }
        removed
    }

    /// 공개 + 대기 중인 방, 최신순 최대 3개
    pub fn list(&self) -> Vec<RoomSummary> {
        let mut open: Vec<(u64, u64, RoomSummary)> = self
            .rooms
            .iter()
            .filter(|room| {
                room.visibility == Visibility::Public && room.status == RoomStatus::Waiting
            })
            .map(|room| (room.created_at, room.seq, room.summary()))
            .collect();
        open.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        open.into_iter()
            .take(LIST_LIMIT)
            .map(|(_, _, summary)| summary)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::effects::{TaskKey, TaskKind};

    fn open_settings() -> RoomSettings {
        RoomSettings::new(Some(4), None, Some("lobby"), None)
    }

    fn create(registry: &RoomRegistry, host: &str) -> Result<RoomView, GameError> {
        registry.create(Player::new(host, None), open_settings(), None, || {})
    }

    #[test]
    fn enforces_room_limit() {
        let registry = RoomRegistry::new(2);
        create(&registry, "a").unwrap();
        create(&registry, "b").unwrap();
        let err = create(&registry, "c").unwrap_err();
        assert_eq!(err, GameError::RoomLimit);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn leaving_a_solo_room_frees_a_slot() {
        let registry = RoomRegistry::new(1);
        let solo = create(&registry, "a").unwrap().room_id;

        let mut vacated = false;
        let err = registry
            .create(Player::new("b", None), open_settings(), None, || vacated = true)
            .unwrap_err();
        assert_eq!(err, GameError::RoomLimit);
        assert!(!vacated);

        let view = registry
            .create(Player::new("a", None), open_settings(), Some(&solo), || {
                registry.with_room(&solo, |room| room.players.remove("a"));
                registry.destroy(&solo);
            })
            .unwrap();
        assert!(!registry.contains(&solo));
        assert!(registry.contains(&view.room_id));
    }

    #[test]
    fn room_codes_are_short_and_unambiguous() {
        let code = generate_room_code();
        assert_eq!(code.len(), ROOM_CODE_LEN);
        assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn list_is_public_waiting_newest_first_capped() {
        let registry = RoomRegistry::new(5);
        let mut ids = Vec::new();
        for host in ["a", "b", "c", "d"] {
            ids.push(create(&registry, host).unwrap().room_id);
        }
        let hidden = registry
            .create(
                Player::new("e", None),
                RoomSettings::new(Some(4), Some(Visibility::Private), None, None),
                None,
                || {},
            )
            .unwrap()
            .room_id;
        registry.with_room(&ids[3], |room| room.status = RoomStatus::Playing);

        let listed: Vec<_> = registry.list().into_iter().map(|s| s.room_id).collect();
        assert_eq!(listed, vec![ids[2].clone(), ids[1].clone(), ids[0].clone()]);
        assert!(!listed.contains(&hidden));
    }

    #[tokio::test]
    async fn destroy_aborts_scheduled_tasks() {
        let registry = RoomRegistry::new(1);
        let id = create(&registry, "a").unwrap().room_id;
        let task = tokio::spawn(std::future::pending::<()>());
        registry.with_room(&id, |room| {
            let token = room.effects.reserve();
            room.effects
                .insert(TaskKey::room(TaskKind::RoundCommit), token, task.abort_handle());
        });

        assert!(!registry.destroy(&id));
        registry.with_room(&id, |room| room.players.remove("a"));
        assert!(registry.destroy(&id));
        assert!(!registry.destroy(&id));
        assert!(task.await.unwrap_err().is_cancelled());
    }
}
