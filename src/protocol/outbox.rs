//! 잠금 해제 후 전송할 메시지 모음
//!
//! 방 상태를 바꾸는 동안에는 DashMap 엔트리를 쥐고 있으므로 바로 보내지 않고
//! 받는 사람을 그 시점의 방 구성원으로 풀어 쌓아 둔다.

use crate::game::Roster;

use super::ServerMessage;

#[derive(Debug, Default)]
pub struct Outbox {
    deliveries: Vec<(String, ServerMessage)>,
}

impl Outbox {
    /// 방 전체에
    pub fn broadcast(&mut self, players: &Roster, message: ServerMessage) {
        for id in players.ids() {
            self.deliveries.push((id.to_string(), message.clone()));
        }
    }

    /// 방에서 한 명을 제외하고
    pub fn broadcast_except(&mut self, players: &Roster, except: &str, message: ServerMessage) {
        for id in players.ids().filter(|id| *id != except) {
            self.deliveries.push((id.to_string(), message.clone()));
        }
    }

    /// 한 사람에게
    pub fn send(&mut self, peer_id: &str, message: ServerMessage) {
        self.deliveries.push((peer_id.to_string(), message));
    }

    #[cfg(test)]
    pub fn messages(&self) -> impl Iterator<Item = &ServerMessage> {
        self.deliveries.iter().map(|(_, m)| m)
    }

    pub fn into_deliveries(self) -> Vec<(String, ServerMessage)> {
        self.deliveries
    }
}
