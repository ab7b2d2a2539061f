//! 방과 플레이어 상태

use std::collections::BTreeMap;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::color;
use super::effects::EffectTable;
use super::{now_millis, DEFAULT_GAME_MODE, MAX_HEALTH, TEAM_MODE};

/// 방 정원 하한
pub const MIN_CAPACITY: usize = 2;
/// 방 정원 상한
pub const MAX_CAPACITY: usize = 16;
/// 정원을 지정하지 않았을 때의 기본값
pub const DEFAULT_CAPACITY: usize = 8;
/// 닉네임이 비었을 때의 기본값
pub const DEFAULT_NICKNAME: &str = "Player";

/// 팀
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// 방 진행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Ended,
}

/// 방 목록 노출 여부
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// 플레이어에게 적용 중인 증강
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAugment {
    pub id: String,
    pub started_at: u64,
}

/// 연결 하나당 한 명의 플레이어
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub nickname: String,
    pub team: Option<Team>,
    pub color: Option<String>,
    pub ready: bool,
    pub health: i32,
    pub wins: u32,
    pub augments: BTreeMap<String, ActiveAugment>,
    pub x: f64,
    pub y: f64,
}

impl Player {
    /// 새 플레이어 (팀 A, 체력 100, 승수 0)
    pub fn new(id: impl Into<String>, nickname: Option<&str>) -> Self {
        Self {
            id: id.into(),
            nickname: sanitize_nickname(nickname),
            team: Some(Team::A),
            color: None,
            ready: false,
            health: MAX_HEALTH,
            wins: 0,
            augments: BTreeMap::new(),
            x: 0.0,
            y: 0.0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// 기본값이 아닌 색상을 가지고 있는지
    pub fn has_color(&self) -> bool {
        color::is_assigned(self.color.as_deref())
    }
}

/// 닉네임 정리: 앞뒤 공백 제거, 비었으면 기본값
pub fn sanitize_nickname(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_NICKNAME.to_string(),
    }
}

/// 입장 순서를 유지하는 플레이어 목록
///
/// 스폰 배치가 입장 순서에 의존하므로 `HashMap` 대신 순서 있는 벡터를 쓴다.
/// 직렬화 시에는 `id -> Player` 맵으로 나간다.
#[derive(Debug, Clone, Default)]
pub struct Roster(Vec<Player>);

impl Roster {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|p| p.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.0.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.0.iter_mut().find(|p| p.id == id)
    }

    pub fn insert(&mut self, player: Player) {
        match self.get_mut(&player.id) {
            Some(existing) => *existing = player,
            None => self.0.push(player),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Player> {
        let index = self.0.iter().position(|p| p.id == id)?;
        Some(self.0.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.0.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.id.as_str())
    }

    pub fn first(&self) -> Option<&Player> {
        self.0.first()
    }

    pub fn to_vec(&self) -> Vec<Player> {
        self.0.clone()
    }
}

impl Serialize for Roster {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for player in &self.0 {
            map.serialize_entry(&player.id, player)?;
        }
        map.end()
    }
}

/// 라운드 결과 스냅샷의 플레이어 항목
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStanding {
    pub id: String,
    pub nickname: String,
    pub color: Option<String>,
    pub wins: u32,
}

impl From<&Player> for RoundStanding {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            nickname: player.nickname.clone(),
            color: player.color.clone(),
            wins: player.wins,
        }
    }
}

/// 라운드 결과 이력 항목
#[derive(Debug, Clone, Serialize)]
pub struct RoundResult {
    pub round: u32,
    pub players: Vec<RoundStanding>,
}

/// 라운드별 증강 선택 기록
#[derive(Debug, Clone, Default)]
pub struct AugmentSelection {
    pub round: u32,
    pub selections: BTreeMap<String, String>,
    /// 완료 처리가 진행 중 (일정 시간 후 해제)
    pub completion_scheduled: bool,
    /// 이 라운드의 선택이 이미 확정됨 (해제되지 않음)
    pub completed: bool,
}

/// 방 생성 옵션
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub max: usize,
    pub visibility: Visibility,
    pub room_name: String,
    pub game_mode: String,
}

impl RoomSettings {
    /// 클라이언트 입력을 정규화 (정원 2..=16 clamp, 빈 값은 기본값)
    pub fn new(
        max: Option<i64>,
        visibility: Option<Visibility>,
        room_name: Option<&str>,
        game_mode: Option<&str>,
    ) -> Self {
        let max = max
            .map(|m| m.clamp(MIN_CAPACITY as i64, MAX_CAPACITY as i64) as usize)
            .unwrap_or(DEFAULT_CAPACITY);
        let game_mode = game_mode
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_GAME_MODE)
            .to_string();
        let room_name = room_name.map(str::trim).unwrap_or_default().to_string();

        Self {
            max,
            visibility: visibility.unwrap_or_default(),
            room_name,
            game_mode,
        }
    }
}

/// 방 정보
pub struct Room {
    pub id: String,
    pub host_id: String,
    pub max: usize,
    pub status: RoomStatus,
    pub players: Roster,
    pub visibility: Visibility,
    pub room_name: String,
    pub game_mode: String,
    pub created_at: u64,
    /// 같은 밀리초에 생성된 방의 정렬용 순번
    pub(crate) seq: u64,
    pub next_team: Team,
    pub current_round: u32,
    pub round_results: Vec<RoundResult>,
    pub augment_selections: Vec<AugmentSelection>,
    pub is_round_ending: bool,
    /// 서버 전용: 예약된 지연 작업
    pub effects: EffectTable,
}

impl Room {
    /// 방장이 팀 A 로 들어간 새 방. 다음 입장자는 팀 B 부터 시도한다.
    pub fn new(id: String, mut host: Player, settings: RoomSettings, seq: u64) -> Self {
        host.team = Some(Team::A);
        let mut players = Roster::default();
        host.color = Some(color::pick_first_free_color(&players));
        let host_id = host.id.clone();
        players.insert(host);

        Self {
            id,
            host_id,
            max: settings.max,
            status: RoomStatus::Waiting,
            players,
            visibility: settings.visibility,
            room_name: settings.room_name,
            game_mode: settings.game_mode,
            created_at: now_millis(),
            seq,
            next_team: Team::B,
            current_round: 0,
            round_results: Vec::new(),
            augment_selections: Vec::new(),
            is_round_ending: false,
            effects: EffectTable::default(),
        }
    }

    pub fn is_team_mode(&self) -> bool {
        self.game_mode == TEAM_MODE
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max
    }

    pub fn team_count(&self, team: Team) -> usize {
        self.players.iter().filter(|p| p.team == Some(team)).count()
    }

    pub fn alive_ids(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn selection(&self, round: u32) -> Option<&AugmentSelection> {
        self.augment_selections.iter().find(|s| s.round == round)
    }

    pub fn selection_mut(&mut self, round: u32) -> &mut AugmentSelection {
        let index = match self.augment_selections.iter().position(|s| s.round == round) {
            Some(index) => index,
            None => {
                self.augment_selections.push(AugmentSelection {
                    round,
                    ..AugmentSelection::default()
                });
                self.augment_selections.len() - 1
            }
        };
        &mut self.augment_selections[index]
    }

    /// 클라이언트로 내보내는 방 상태 (서버 전용 필드 제외)
    pub fn view(&self) -> RoomView {
        RoomView {
            room_id: self.id.clone(),
            host_id: self.host_id.clone(),
            max: self.max,
            status: self.status,
            players: self.players.clone(),
            visibility: self.visibility,
            room_name: self.room_name.clone(),
            game_mode: self.game_mode.clone(),
            created_at: self.created_at,
            current_round: self.current_round,
            round_results: self.round_results.clone(),
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.id.clone(),
            room_name: self.room_name.clone(),
            game_mode: self.game_mode.clone(),
            host_nickname: self
                .players
                .get(&self.host_id)
                .map(|p| p.nickname.clone())
                .unwrap_or_default(),
            player_count: self.players.len(),
            max: self.max,
            created_at: self.created_at,
        }
    }
}

/// `room:update` 등으로 나가는 방 상태
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_id: String,
    pub host_id: String,
    pub max: usize,
    pub status: RoomStatus,
    pub players: Roster,
    pub visibility: Visibility,
    pub room_name: String,
    pub game_mode: String,
    pub created_at: u64,
    pub current_round: u32,
    pub round_results: Vec<RoundResult>,
}

/// `room:list` 항목
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub room_name: String,
    pub game_mode: String,
    pub host_nickname: String,
    pub player_count: usize,
    pub max: usize,
    pub created_at: u64,
}
