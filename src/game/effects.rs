//! 방별 지연 작업 테이블
//!
//! 도트 데미지, 라운드 결과 발표, 증강 단계 전환 같은 예약 작업의 abort 핸들을
//! `(대상, 종류)` 키로 보관한다. 방이 사라지면 테이블과 함께 모든 작업이 취소된다.

use std::collections::HashMap;

use tokio::task::AbortHandle;

/// 예약 작업 종류
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// 증강 효과 (증강 id)
    Effect(&'static str),
    /// 라운드 종료 확정
    RoundCommit,
    /// 증강 선택 단계 또는 최종 결과 발표
    Phase,
    /// 증강 완료 플래그 해제 (라운드)
    AugmentFlagReset(u32),
}

/// 작업 키. 방 전체 작업은 `target` 이 `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub target: Option<String>,
    pub kind: TaskKind,
}

impl TaskKey {
    pub fn room(kind: TaskKind) -> Self {
        Self { target: None, kind }
    }

    pub fn effect(target: &str, augment_id: &'static str) -> Self {
        Self {
            target: Some(target.to_string()),
            kind: TaskKind::Effect(augment_id),
        }
    }
}

#[derive(Debug)]
struct Entry {
    token: u64,
    handle: AbortHandle,
}

/// 방 하나의 예약 작업 목록
#[derive(Debug, Default)]
pub struct EffectTable {
    tasks: HashMap<TaskKey, Entry>,
    next_token: u64,
}

impl EffectTable {
    /// 새 작업용 토큰 발급. 작업이 끝날 때 `finish` 에 같은 토큰을 넘긴다.
    pub fn reserve(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// 작업 등록. 같은 키의 기존 작업은 취소된다.
    pub fn insert(&mut self, key: TaskKey, token: u64, handle: AbortHandle) {
        if let Some(previous) = self.tasks.insert(key, Entry { token, handle }) {
            previous.handle.abort();
        }
    }

    /// 끝난 작업 제거. 그 사이 같은 키로 교체되었다면 건드리지 않는다.
    pub fn finish(&mut self, key: &TaskKey, token: u64) {
        if self.tasks.get(key).is_some_and(|e| e.token == token) {
            self.tasks.remove(key);
        }
    }

    /// 특정 플레이어를 대상으로 한 작업 모두 취소
    pub fn cancel_target(&mut self, target: &str) {
        self.tasks.retain(|key, entry| {
            let keep = key.target.as_deref() != Some(target);
            if !keep {
                entry.handle.abort();
            }
            keep
        });
    }

    /// 증강 효과 작업만 취소 (방 단위 작업은 유지)
    pub fn cancel_effects(&mut self) {
        self.tasks.retain(|key, entry| {
            let keep = !matches!(key.kind, TaskKind::Effect(_));
            if !keep {
                entry.handle.abort();
            }
            keep
        });
    }

    pub fn abort_all(&mut self) {
        for (_, entry) in self.tasks.drain() {
            entry.handle.abort();
        }
    }

    pub fn contains(&self, key: &TaskKey) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for EffectTable {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sleeper() -> tokio::task::JoinHandle<()> {
        tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
    }

    #[tokio::test]
    async fn replacing_a_key_aborts_previous_task() {
        let mut table = EffectTable::default();
        let key = TaskKey::effect("p1", "poison");

        let first = sleeper();
        let token = table.reserve();
        table.insert(key.clone(), token, first.abort_handle());

        let second = sleeper();
        let token2 = table.reserve();
        table.insert(key.clone(), token2, second.abort_handle());

        assert!(first.await.unwrap_err().is_cancelled());
        assert_eq!(table.len(), 1);

        // 예전 토큰으로는 새 작업을 지우지 못한다
        table.finish(&key, token);
        assert!(table.contains(&key));
        table.finish(&key, token2);
        assert!(table.is_empty());
        second.abort();
    }

    #[tokio::test]
    async fn cancel_target_only_touches_that_player() {
        let mut table = EffectTable::default();
        let victim = sleeper();
        let other = sleeper();
        let round = sleeper();

        let t = table.reserve();
        table.insert(TaskKey::effect("p1", "burn"), t, victim.abort_handle());
        let t = table.reserve();
        table.insert(TaskKey::effect("p2", "burn"), t, other.abort_handle());
        let t = table.reserve();
        table.insert(TaskKey::room(TaskKind::RoundCommit), t, round.abort_handle());

        table.cancel_target("p1");
        assert!(victim.await.unwrap_err().is_cancelled());
        assert_eq!(table.len(), 2);

        table.cancel_effects();
        assert!(other.await.unwrap_err().is_cancelled());
        assert!(table.contains(&TaskKey::room(TaskKind::RoundCommit)));

        drop(table);
        assert!(round.await.unwrap_err().is_cancelled());
    }
}
