//! 연결 핸들러

use crate::protocol::ServerMessage;
use crate::state::{AppState, PeerSession};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use super::room::leave_room_internal;

/// 새 연결 처리
pub fn handle_connection(state: &Arc<AppState>, sender: UnboundedSender<ServerMessage>) -> String {
    let peer_id = Uuid::new_v4().to_string();

    let session = PeerSession {
        id: peer_id.clone(),
        room_id: None,
        sender: sender.clone(),
        connected_at: Instant::now(),
    };

    state.peers.insert(peer_id.clone(), session);

    let _ = sender.send(ServerMessage::Connected {
        socket_id: peer_id.clone(),
    });

    tracing::info!(peer_id = %peer_id, "New connection established");
    peer_id
}

/// 연결 해제 처리. 명시적인 방 나가기와 같은 경로를 탄다.
pub fn handle_disconnect(state: &Arc<AppState>, peer_id: &str) {
    let Some((_, session)) = state.peers.remove(peer_id) else {
        return;
    };
    if let Some(room_id) = session.room_id.as_deref() {
        leave_room_internal(state, peer_id, room_id);
    }
    tracing::info!(
        peer_id = %session.id,
        session_secs = session.connected_at.elapsed().as_secs(),
        "Connection closed"
    );
}
