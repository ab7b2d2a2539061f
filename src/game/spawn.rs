//! 스폰 위치 계산
//!
//! 고정된 6개의 앵커를 팀 A/B 가 번갈아 쓴다. 앵커보다 사람이 많으면
//! 한 바퀴 돌 때마다 x 좌표를 ±10px 씩 더 벌려 겹치지 않게 한다.

use serde::Serialize;

use super::room::{Room, Team};

/// 맵에 고정된 스폰 지점
#[derive(Debug, Clone, Copy)]
pub struct SpawnAnchor {
    pub team: Team,
    pub x: f64,
    pub y: f64,
}

pub const ANCHORS: [SpawnAnchor; 6] = [
    SpawnAnchor { team: Team::A, x: 160.0, y: 220.0 },
    SpawnAnchor { team: Team::B, x: 1120.0, y: 220.0 },
    SpawnAnchor { team: Team::A, x: 220.0, y: 460.0 },
    SpawnAnchor { team: Team::B, x: 1060.0, y: 460.0 },
    SpawnAnchor { team: Team::A, x: 160.0, y: 700.0 },
    SpawnAnchor { team: Team::B, x: 1120.0, y: 700.0 },
];

/// 한 플레이어의 스폰 배정 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnPoint {
    pub player_id: String,
    /// `ANCHORS` 에서의 인덱스
    pub spawn_index: usize,
    pub x: f64,
    pub y: f64,
}

/// 겹침 방지용 x 오프셋: 1바퀴 +10, 2바퀴 -20, 3바퀴 +30 ...
fn lap_jitter(lap: usize) -> f64 {
    if lap == 0 {
        return 0.0;
    }
    let sign = if lap % 2 == 1 { 1.0 } else { -1.0 };
    sign * 10.0 * lap as f64
}

fn place(player_id: &str, slot: usize, anchors: &[usize]) -> SpawnPoint {
    let spawn_index = anchors[slot % anchors.len()];
    let lap = slot / anchors.len();
    let anchor = ANCHORS[spawn_index];
    SpawnPoint {
        player_id: player_id.to_string(),
        spawn_index,
        x: anchor.x + lap_jitter(lap),
        y: anchor.y,
    }
}

/// 입장 순서 기준으로 모든 플레이어의 스폰 위치를 계산한다
pub fn compute_spawn_positions(room: &Room) -> Vec<SpawnPoint> {
    if !room.is_team_mode() {
        let all: Vec<usize> = (0..ANCHORS.len()).collect();
        return room
            .players
            .iter()
            .enumerate()
            .map(|(slot, p)| place(&p.id, slot, &all))
            .collect();
    }

    let subset = |team: Team| -> Vec<usize> {
        ANCHORS
            .iter()
            .enumerate()
            .filter(|(_, a)| a.team == team)
            .map(|(i, _)| i)
            .collect()
    };
    let anchors_a = subset(Team::A);
    let anchors_b = subset(Team::B);
    let (mut slot_a, mut slot_b) = (0, 0);

    room.players
        .iter()
        .map(|p| match p.team.unwrap_or(Team::A) {
            Team::A => {
                slot_a += 1;
                place(&p.id, slot_a - 1, &anchors_a)
            }
            Team::B => {
                slot_b += 1;
                place(&p.id, slot_b - 1, &anchors_b)
            }
        })
        .collect()
}
