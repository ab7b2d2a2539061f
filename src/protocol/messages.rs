//! 클라이언트-서버 메시지 프로토콜 정의

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GameError;
use crate::game::augment::StatusEffect;
use crate::game::spawn::SpawnPoint;
use crate::game::{ActiveAugment, Player, RoomSummary, RoomView, RoundStanding, Team, Visibility};

/// 클라이언트 → 서버 메시지
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    // Room Management
    #[serde(rename = "room:create")]
    CreateRoom(CreateRoomRequest),
    #[serde(rename = "room:list")]
    ListRooms {},
    #[serde(rename = "room:info")]
    RoomInfo(RoomInfoRequest),
    #[serde(rename = "room:join")]
    JoinRoom(JoinRoomRequest),
    #[serde(rename = "room:leave")]
    LeaveRoom {},

    // Lobby
    #[serde(rename = "player:ready")]
    Ready {},
    #[serde(rename = "player:select")]
    Select(SelectRequest),
    #[serde(rename = "player:setColor")]
    SetColor(SetColorRequest),

    // Match
    #[serde(rename = "game:start")]
    StartGame {},
    #[serde(rename = "game:bulletHit")]
    BulletHit(Value),
    #[serde(rename = "round:end")]
    RoundEnd(RoundEndRequest),
    #[serde(rename = "augment:select")]
    AugmentSelect(AugmentSelectRequest),

    // Relay
    #[serde(rename = "input:move")]
    Move(MoveInput),
    #[serde(rename = "input:shoot")]
    Shoot(ShootInput),
    #[serde(rename = "pose:update")]
    PoseUpdate(Value),
    #[serde(rename = "particle:create")]
    ParticleCreate(Value),
    #[serde(rename = "game:event")]
    GameEvent(Value),
    #[serde(rename = "chat:send")]
    ChatSend(ChatRequest),
}

/// 수신 프레임: `{"type": ..., "payload": ..., "ack": n}`
#[derive(Debug, Clone)]
pub struct ClientFrame {
    pub message: ClientMessage,
    pub ack: Option<u64>,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    ack: Option<u64>,
}

impl ClientFrame {
    /// 텍스트 프레임 파싱. payload 가 없으면 빈 객체로 취급한다.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawFrame = serde_json::from_str(text)?;
        let payload = match raw.payload {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };
        let message = serde_json::from_value(serde_json::json!({
            "type": raw.kind,
            "payload": payload,
        }))?;
        Ok(Self { message, ack: raw.ack })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub max: Option<i64>,
    pub visibility: Option<Visibility>,
    pub room_name: Option<String>,
    pub game_mode: Option<String>,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomInfoRequest {
    pub room_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_id: String,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelectRequest {
    pub team: Option<Team>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SetColorRequest {
    pub room_id: Option<String>,
    pub color: String,
}

/// `game:bulletHit` 의 타입 있는 해석 (원본 payload 는 그대로 중계)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BulletHitRequest {
    pub room_id: Option<String>,
    pub player_id: Option<String>,
    pub hit: Option<HitInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HitInfo {
    pub damage: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// 수동 라운드 종료. 클라이언트가 보내는 `players` 목록은 읽지 않고
/// 서버가 아는 생존자를 승자로 쓴다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoundEndRequest {}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AugmentSelectRequest {
    pub augment_id: String,
    pub round: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MoveInput {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub facing: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShootInput {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub message: String,
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    // Connection
    #[serde(rename = "connected", rename_all = "camelCase")]
    Connected { socket_id: String },
    #[serde(rename = "ack")]
    Ack(Ack),

    // Room Events
    #[serde(rename = "room:update")]
    RoomUpdate(RoomView),
    #[serde(rename = "player:joined")]
    PlayerJoined { player: Player },
    #[serde(rename = "player:left", rename_all = "camelCase")]
    PlayerLeft { id: String, room_id: String },
    #[serde(rename = "player:updated")]
    PlayerUpdated { player: Player },
    #[serde(rename = "room:closed", rename_all = "camelCase")]
    RoomClosed { room_id: String },

    // Match
    #[serde(rename = "game:readyToStart", rename_all = "camelCase")]
    ReadyToStart { room_id: String },
    #[serde(rename = "game:started", rename_all = "camelCase")]
    GameStarted {
        room_id: String,
        players: Vec<Player>,
        spawns: Vec<SpawnPoint>,
    },
    #[serde(rename = "game:healthUpdate", rename_all = "camelCase")]
    HealthUpdate { player_id: String, health: i32 },
    #[serde(rename = "game:event")]
    GameEvent(GameEventPayload),
    #[serde(rename = "game:bulletHit")]
    BulletHit(Value),
    #[serde(rename = "round:result")]
    RoundResult {
        round: u32,
        winners: Vec<String>,
        players: Vec<RoundStanding>,
    },
    #[serde(rename = "round:augment")]
    RoundAugment { round: u32, choices: Vec<String> },
    #[serde(rename = "augment:progress", rename_all = "camelCase")]
    AugmentProgress {
        round: u32,
        player_id: String,
        selected: usize,
        total: usize,
    },
    #[serde(rename = "augment:complete")]
    AugmentComplete {
        round: u32,
        selections: BTreeMap<String, String>,
    },
    #[serde(rename = "augment:snapshot")]
    AugmentSnapshot {
        augments: BTreeMap<String, BTreeMap<String, ActiveAugment>>,
    },
    #[serde(rename = "game:final", rename_all = "camelCase")]
    GameFinal {
        room_id: String,
        winner_ids: Vec<String>,
        standings: Vec<RoundStanding>,
    },

    // Relay
    #[serde(rename = "chat:message")]
    ChatMessage {
        id: String,
        nickname: String,
        message: String,
        at: u64,
    },
    #[serde(rename = "state:move")]
    StateMove {
        id: String,
        x: f64,
        y: f64,
        vx: f64,
        vy: f64,
        facing: Value,
    },
    #[serde(rename = "state:shoot")]
    StateShoot { id: String, x: f64, y: f64, angle: f64 },
    #[serde(rename = "pose:update")]
    PoseUpdate(Value),
    #[serde(rename = "particle:create")]
    ParticleCreate(Value),
}

impl ServerMessage {
    pub fn event(event: GameEvent) -> Self {
        Self::GameEvent(GameEventPayload::Typed(event))
    }
}

/// `game:event` payload: 서버가 만든 이벤트이거나 클라이언트 이벤트의 중계
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GameEventPayload {
    Typed(GameEvent),
    Relayed(Value),
}

/// 서버가 발행하는 `game:event` 종류
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    #[serde(rename_all = "camelCase")]
    ShowHealthBar { player_id: String, health: i32 },
    #[serde(rename_all = "camelCase")]
    Status {
        player_id: String,
        source_id: String,
        augment_id: String,
        #[serde(flatten)]
        effect: StatusEffect,
    },
    #[serde(rename_all = "camelCase")]
    Dead {
        player_id: String,
        killer_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    RespawnAll {
        player_id: String,
        spawn_index: usize,
        x: f64,
        y: f64,
    },
    #[serde(rename_all = "camelCase")]
    Alive { player_id: String },
}

/// 요청별 ack 응답
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub id: u64,
    pub ok: bool,
    #[serde(flatten)]
    pub data: Option<AckData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GameError>,
}

impl Ack {
    pub fn from_result(id: u64, result: Result<AckData, GameError>) -> Self {
        match result {
            Ok(data) => Self {
                id,
                ok: true,
                data: Some(data),
                error: None,
            },
            Err(error) => Self {
                id,
                ok: false,
                data: None,
                error: Some(error),
            },
        }
    }
}

/// 성공 ack 에 실리는 데이터
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AckData {
    Room { room: RoomView },
    Rooms { rooms: Vec<RoomSummary> },
    Left { left: Vec<String> },
    Ready { ready: bool },
    #[serde(rename_all = "camelCase")]
    AllSelected { all_selected: bool },
    Empty {},
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ack_bearing_frame() {
        let frame = ClientFrame::parse(
            r#"{"type":"room:create","payload":{"max":4,"gameMode":"팀전","nickname":"kim"},"ack":7}"#,
        )
        .unwrap();
        assert_eq!(frame.ack, Some(7));
        match frame.message {
            ClientMessage::CreateRoom(req) => {
                assert_eq!(req.max, Some(4));
                assert_eq!(req.game_mode.as_deref(), Some("팀전"));
                assert_eq!(req.nickname.as_deref(), Some("kim"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_payload_is_an_empty_object() {
        let frame = ClientFrame::parse(r#"{"type":"room:list"}"#).unwrap();
        assert!(matches!(frame.message, ClientMessage::ListRooms {}));
        assert_eq!(frame.ack, None);

        let frame = ClientFrame::parse(r#"{"type":"player:ready","payload":{}}"#).unwrap();
        assert!(matches!(frame.message, ClientMessage::Ready {}));
    }

    #[test]
    fn relay_payload_is_kept_verbatim() {
        let frame = ClientFrame::parse(
            r#"{"type":"pose:update","payload":{"roomId":"R1","arm":1.5}}"#,
        )
        .unwrap();
        match frame.message {
            ClientMessage::PoseUpdate(value) => assert_eq!(value["arm"], 1.5),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(ClientFrame::parse(r#"{"type":"nope","payload":{}}"#).is_err());
        assert!(ClientFrame::parse("not json").is_err());
    }

    #[test]
    fn ack_serializes_flat() {
        let ok = serde_json::to_value(ServerMessage::Ack(Ack::from_result(
            3,
            Ok(AckData::Ready { ready: true }),
        )))
        .unwrap();
        assert_eq!(ok["type"], "ack");
        assert_eq!(ok["payload"]["id"], 3);
        assert_eq!(ok["payload"]["ok"], true);
        assert_eq!(ok["payload"]["ready"], true);

        let err = serde_json::to_value(ServerMessage::Ack(Ack::from_result(
            4,
            Err(GameError::ColorTaken),
        )))
        .unwrap();
        assert_eq!(err["payload"]["ok"], false);
        assert_eq!(err["payload"]["error"], "COLOR_TAKEN");
    }

    #[test]
    fn game_event_carries_type_tag() {
        let json = serde_json::to_value(ServerMessage::event(GameEvent::Status {
            player_id: "t".into(),
            source_id: "s".into(),
            augment_id: "shock".into(),
            effect: StatusEffect::Stun { duration_ms: 800 },
        }))
        .unwrap();
        assert_eq!(json["type"], "game:event");
        assert_eq!(json["payload"]["type"], "status");
        assert_eq!(json["payload"]["effect"], "stun");
        assert_eq!(json["payload"]["durationMs"], 800);
        assert_eq!(json["payload"]["playerId"], "t");
    }
}
