//! 증강(퍼크) 효과 레지스트리
//!
//! 증강 id 마다 효과 정의 하나. 명중 시 사격자의 활성 증강을 순회하며
//! 즉발 효과는 바로 이벤트로 내보내고, 도트 데미지는 예약 요청으로 돌려준다.

use std::time::Duration;

use serde::Serialize;

use crate::protocol::{GameEvent, Outbox, ServerMessage};

use super::room::Room;
use super::MAX_HEALTH;

/// 지속 데미지 정의
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOverTime {
    pub period: Duration,
    pub damage: i32,
    pub ticks: u32,
    /// 틱마다 체력바 UI 이벤트도 보낼지
    pub show_health_bar: bool,
}

/// 증강 효과
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    DamageOverTime(DamageOverTime),
    Slow { duration_ms: u64, multiplier: f64 },
    Stun { duration_ms: u64 },
    Knockback { impulse: f64 },
    Lifesteal { heal: i32 },
}

#[derive(Debug, Clone, Copy)]
pub struct AugmentDef {
    pub id: &'static str,
    pub effect: Effect,
}

pub static AUGMENTS: [AugmentDef; 6] = [
    AugmentDef {
        id: "poison",
        effect: Effect::DamageOverTime(DamageOverTime {
            period: Duration::from_millis(1000),
            damage: 5,
            ticks: 3,
            show_health_bar: true,
        }),
    },
    AugmentDef {
        id: "burn",
        effect: Effect::DamageOverTime(DamageOverTime {
            period: Duration::from_millis(2000),
            damage: 10,
            ticks: 3,
            show_health_bar: false,
        }),
    },
    AugmentDef {
        id: "frost",
        effect: Effect::Slow { duration_ms: 2000, multiplier: 0.5 },
    },
    AugmentDef {
        id: "shock",
        effect: Effect::Stun { duration_ms: 800 },
    },
    AugmentDef {
        id: "impact",
        effect: Effect::Knockback { impulse: 600.0 },
    },
    AugmentDef {
        id: "vampire",
        effect: Effect::Lifesteal { heal: 10 },
    },
];

pub fn lookup(id: &str) -> Option<&'static AugmentDef> {
    AUGMENTS.iter().find(|a| a.id == id)
}

/// 선택 단계에서 클라이언트에 제시하는 증강 목록
pub fn choices() -> Vec<String> {
    AUGMENTS.iter().map(|a| a.id.to_string()).collect()
}

/// `game:event` `status` 로 나가는 상태 이상
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "camelCase")]
pub enum StatusEffect {
    #[serde(rename_all = "camelCase")]
    Slow { duration_ms: u64, multiplier: f64 },
    #[serde(rename_all = "camelCase")]
    Stun { duration_ms: u64 },
    Knockback { vx: f64, vy: f64 },
}

/// 예약이 필요한 도트 데미지 요청
#[derive(Debug, Clone, PartialEq)]
pub struct DotRequest {
    pub augment_id: &'static str,
    pub dot: DamageOverTime,
}

/// 사격자 → 대상 방향의 정규화 벡터 × 충격량. 위치가 같으면 +x 방향.
pub fn knockback_vector(from: (f64, f64), to: (f64, f64), impulse: f64) -> (f64, f64) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len = dx.hypot(dy);
    if len < f64::EPSILON {
        return (impulse, 0.0);
    }
    (dx / len * impulse, dy / len * impulse)
}

/// 명중 한 번에 대해 사격자의 증강 효과를 적용한다.
///
/// `dealt` 는 실제로 깎인 체력, `lethal` 은 이번 명중으로 대상이 쓰러졌는지.
pub fn apply_on_hit(
    room: &mut Room,
    shooter_id: &str,
    target_id: &str,
    dealt: i32,
    lethal: bool,
    out: &mut Outbox,
) -> Vec<DotRequest> {
    let Some(shooter) = room.players.get(shooter_id) else {
        return Vec::new();
    };
    let shooter_pos = (shooter.x, shooter.y);
    let active: Vec<&'static AugmentDef> =
        shooter.augments.keys().filter_map(|id| lookup(id)).collect();
    let target_pos = room
        .players
        .get(target_id)
        .map(|p| (p.x, p.y))
        .unwrap_or(shooter_pos);

    let mut dots = Vec::new();
    for def in active {
        let status = match def.effect {
            Effect::DamageOverTime(dot) => {
                if !lethal && dealt > 0 {
                    dots.push(DotRequest { augment_id: def.id, dot });
                }
                None
            }
            Effect::Slow { duration_ms, multiplier } => {
                Some(StatusEffect::Slow { duration_ms, multiplier })
            }
            Effect::Stun { duration_ms } => Some(StatusEffect::Stun { duration_ms }),
            Effect::Knockback { impulse } => {
                let (vx, vy) = knockback_vector(shooter_pos, target_pos, impulse);
                Some(StatusEffect::Knockback { vx, vy })
            }
            Effect::Lifesteal { heal } => {
                let healed = room
                    .players
                    .get_mut(shooter_id)
                    .filter(|s| dealt > 0 && s.is_alive())
                    .map(|s| {
                        s.health = (s.health + heal).min(MAX_HEALTH);
                        s.health
                    });
                if let Some(health) = healed {
                    out.broadcast(
                        &room.players,
                        ServerMessage::HealthUpdate {
                            player_id: shooter_id.to_string(),
                            health,
                        },
                    );
                }
                None
            }
        };

        if let Some(effect) = status {
            if !lethal {
                out.broadcast(
                    &room.players,
                    ServerMessage::event(GameEvent::Status {
                        player_id: target_id.to_string(),
                        source_id: shooter_id.to_string(),
                        augment_id: def.id.to_string(),
                        effect,
                    }),
                );
            }
        }
    }
    dots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::room::{ActiveAugment, Player, RoomSettings};

    fn duel(augments: &[&str]) -> Room {
        let mut shooter = Player::new("shooter", None);
        for id in augments {
            shooter.augments.insert(
                (*id).to_string(),
                ActiveAugment { id: (*id).to_string(), started_at: 0 },
            );
        }
        let mut room = Room::new("DUEL01".into(), shooter, RoomSettings::new(None, None, None, None), 0);
        let mut target = Player::new("target", None);
        target.x = 100.0;
        room.players.insert(target);
        room
    }

    #[test]
    fn registry_knows_every_augment() {
        for def in &AUGMENTS {
            assert_eq!(lookup(def.id).unwrap().id, def.id);
        }
        assert!(lookup("unknown").is_none());
        assert_eq!(choices().len(), AUGMENTS.len());
    }

    #[test]
    fn knockback_points_away_from_shooter() {
        let (vx, vy) = knockback_vector((0.0, 0.0), (3.0, 4.0), 600.0);
        assert!((vx - 360.0).abs() < 1e-9);
        assert!((vy - 480.0).abs() < 1e-9);
        assert_eq!(knockback_vector((5.0, 5.0), (5.0, 5.0), 600.0), (600.0, 0.0));
    }

    #[test]
    fn dot_is_requested_only_on_non_lethal_hit() {
        let mut room = duel(&["poison", "burn"]);
        let mut out = Outbox::default();
        let dots = apply_on_hit(&mut room, "shooter", "target", 25, false, &mut out);
        let ids: Vec<_> = dots.iter().map(|d| d.augment_id).collect();
        assert_eq!(ids, vec!["burn", "poison"]);

        let dots = apply_on_hit(&mut room, "shooter", "target", 25, true, &mut out);
        assert!(dots.is_empty());
    }

    #[test]
    fn lifesteal_heals_shooter_up_to_max() {
        let mut room = duel(&["vampire"]);
        room.players.get_mut("shooter").unwrap().health = 95;
        let mut out = Outbox::default();
        apply_on_hit(&mut room, "shooter", "target", 25, false, &mut out);
        assert_eq!(room.players.get("shooter").unwrap().health, MAX_HEALTH);
        assert!(out.messages().any(|m| matches!(
            m,
            ServerMessage::HealthUpdate { player_id, health: 100 } if player_id == "shooter"
        )));
    }

    #[test]
    fn status_effects_are_broadcast() {
        let mut room = duel(&["impact", "frost"]);
        let mut out = Outbox::default();
        apply_on_hit(&mut room, "shooter", "target", 25, false, &mut out);
        let statuses: Vec<_> = out
            .messages()
            .filter_map(|m| match m {
                ServerMessage::GameEvent(crate::protocol::GameEventPayload::Typed(
                    GameEvent::Status { effect, .. },
                )) => Some(effect.clone()),
                _ => None,
            })
            .collect();
        assert!(statuses.contains(&StatusEffect::Knockback { vx: 600.0, vy: 0.0 }));
        assert!(statuses.contains(&StatusEffect::Slow { duration_ms: 2000, multiplier: 0.5 }));
    }
}
