//! InMemory CooldownGate 実装
//!
//! キー (canvas_id, user_id) ごとに最後に受理した配置時刻を保持します。
//! `DashMap` の entry API でキー単位のチェック & セットを原子的に行うため、
//! 同じキーで同時に届いたリクエストのうち通過できるのは高々 1 つです。

use dashmap::{DashMap, mapref::entry::Entry};

use crate::domain::{CanvasId, CooldownGate, Timestamp, UserId, cooldown::cooldown_millis};

type CooldownKey = (CanvasId, UserId);

/// インメモリ CooldownGate 実装
#[derive(Default)]
pub struct InMemoryCooldownGate {
    last_accepted: DashMap<CooldownKey, Timestamp>,
}

impl InMemoryCooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記録済みのキー数
    pub fn tracked_keys(&self) -> usize {
        self.last_accepted.len()
    }
}

impl CooldownGate for InMemoryCooldownGate {
    fn allow(
        &self,
        canvas_id: &CanvasId,
        user_id: &UserId,
        cooldown_seconds: u64,
        now: Timestamp,
    ) -> bool {
        let cooldown_ms = cooldown_millis(cooldown_seconds);
        match self
            .last_accepted
            .entry((canvas_id.clone(), user_id.clone()))
        {
            Entry::Occupied(mut entry) => {
                if cooldown_seconds == 0 || now.millis_since(*entry.get()) >= cooldown_ms {
                    entry.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    fn remaining_ms(
        &self,
        canvas_id: &CanvasId,
        user_id: &UserId,
        cooldown_seconds: u64,
        now: Timestamp,
    ) -> i64 {
        if cooldown_seconds == 0 {
            return 0;
        }
        self.last_accepted
            .get(&(canvas_id.clone(), user_id.clone()))
            .map(|last| {
                cooldown_millis(cooldown_seconds)
                    .saturating_sub(now.millis_since(*last.value()))
                    .max(0)
            })
            .unwrap_or(0)
    }
}
