//! 애플리케이션 상태 관리

use crate::config::Config;
use crate::game::RoomRegistry;
use crate::protocol::ServerMessage;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// 서버 전체 상태. `main` 에서 한 번 만들어 `Arc` 로 공유한다.
pub struct AppState {
    /// 방 정보 (room_id -> Room)
    pub rooms: RoomRegistry,
    /// 피어 세션 (peer_id -> PeerSession)
    pub peers: DashMap<String, PeerSession>,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            rooms: RoomRegistry::new(config.game.max_rooms),
            peers: DashMap::new(),
            config: Arc::new(config),
        }
    }

    /// 피어가 현재 속한 방
    pub fn room_of(&self, peer_id: &str) -> Option<String> {
        self.peers
            .get(peer_id)
            .and_then(|session| session.room_id.clone())
    }

    pub fn set_room_of(&self, peer_id: &str, room_id: Option<String>) {
        if let Some(mut session) = self.peers.get_mut(peer_id) {
            session.room_id = room_id;
        }
    }
}

/// 피어 세션 정보
pub struct PeerSession {
    pub id: String,
    pub room_id: Option<String>,
    pub sender: UnboundedSender<ServerMessage>,
    pub connected_at: Instant,
}
