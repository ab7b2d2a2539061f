//! 환경 변수 기반 설정 관리

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub game: GameConfig,
    pub log_level: String,
}

/// 매치 진행 설정
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// 동시에 존재할 수 있는 방 개수
    pub max_rooms: usize,
    /// 최종 승리에 필요한 라운드 승수
    pub wins_to_finish: u32,
    /// 라운드 종료 감지 → 결과 발표까지의 지연
    pub round_result_delay: Duration,
    /// 결과 발표 → 증강 선택 / 최종 결과까지의 지연
    pub phase_delay: Duration,
    /// 증강 완료 플래그 해제까지의 지연
    pub augment_flag_reset: Duration,
    /// 클라이언트가 데미지를 보내지 않았을 때의 기본 탄환 데미지
    pub bullet_damage: i32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_rooms: 5,
            wins_to_finish: 5,
            round_result_delay: Duration::from_millis(3000),
            phase_delay: Duration::from_millis(3000),
            augment_flag_reset: Duration::from_millis(2000),
            bullet_damage: 25,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5502,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["http://localhost:3500".to_string()],
            game: GameConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let game = defaults.game.clone();

        Self {
            port: parse_var("PORT", defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            game: GameConfig {
                max_rooms: parse_var("MAX_ROOMS", game.max_rooms),
                wins_to_finish: parse_var("WINS_TO_FINISH", game.wins_to_finish),
                round_result_delay: parse_millis("ROUND_RESULT_DELAY_MS", game.round_result_delay),
                phase_delay: parse_millis("PHASE_DELAY_MS", game.phase_delay),
                augment_flag_reset: parse_millis("AUGMENT_FLAG_RESET_MS", game.augment_flag_reset),
                bullet_damage: parse_var("BULLET_DAMAGE", game.bullet_damage),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_millis(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
