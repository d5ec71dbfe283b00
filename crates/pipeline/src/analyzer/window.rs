//! 윈도우 카운터 -- 고정 시간 윈도우 내 키별 발생 횟수
//!
//! 키(`규칙명:소스`)별 카운트를 유지하고, 윈도우 경계마다
//! [`WindowCounter::reset`]으로 전체를 원자적으로 0으로 되돌립니다.
//! 카운트는 로컬 근사치이며 재시작 간에 보존되지 않습니다.

use std::collections::HashMap;

use tokio::time::Instant;

/// 고정 윈도우 빈도 카운터
#[derive(Debug)]
pub struct WindowCounter {
    /// 키별 발생 횟수
    counts: HashMap<String, u64>,
    /// 현재 윈도우 시작 시각
    window_started: Instant,
}

impl WindowCounter {
    /// 새 카운터를 생성합니다. 윈도우는 생성 시각부터 시작합니다.
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            window_started: Instant::now(),
        }
    }

    /// 키의 카운트를 1 증가시키고, 증가 후의 값을 반환합니다.
    pub fn increment(&mut self, key: &str) -> u64 {
        let count = self.counts.entry(key.to_owned()).or_insert(0);
        *count += 1;
        *count
    }

    /// 키의 현재 카운트를 반환합니다. 없으면 0입니다.
    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// 모든 카운트를 0으로 되돌리고 윈도우 시작 시각을 갱신합니다.
    pub fn reset(&mut self) {
        self.counts.clear();
        self.window_started = Instant::now();
    }

    /// 추적 중인 키 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// 추적 중인 키가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// 현재 윈도우가 시작된 시각을 반환합니다.
    pub fn window_started(&self) -> Instant {
        self.window_started
    }
}

impl Default for WindowCounter {
    fn default() -> Self {
        Self::new()
    }
}
