//! 분석기 -- 규칙 평가, 패턴/빈도 메타데이터, 알림 생성
//!
//! Q2의 단독 소비자입니다. 레코드마다 등록 순서대로 모든 규칙을
//! 평가하고, 발화할 때마다 Bloom 필터 표본(add 이전에 contains)과
//! 윈도우 카운터 증가를 수행한 뒤 알림을 Q3에 적재합니다.
//!
//! Bloom 필터와 윈도우 카운터는 분석기가 단독 소유하며, 평가 루프와
//! 윈도우 리셋 티커 사이에서만 잠금으로 공유됩니다. 윈도우 리셋은
//! 카운터만 비웁니다 -- Bloom 필터는 분석기 수명 동안 누적됩니다.

pub mod bloom;
pub mod rules;
pub mod window;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vigil_core::types::{Alert, AlertMetadata, ParsedLog};

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;

use self::bloom::BloomFilter;
use self::rules::Rule;
use self::window::WindowCounter;

/// 분석기
///
/// `start()`는 평가 루프와 윈도우 리셋 루프 두 태스크를 스폰하고,
/// `stop()`은 둘을 조인합니다. 평가 루프는 Q2가 닫히고 비워지면
/// 종료하고, 리셋 루프는 종료 토큰으로 끝납니다.
pub struct Analyzer {
    rules: Arc<Vec<Rule>>,
    bloom: Arc<Mutex<BloomFilter>>,
    window: Arc<Mutex<WindowCounter>>,
    window_len: Duration,
    input: Option<mpsc::Receiver<ParsedLog>>,
    output: Option<mpsc::Sender<Alert>>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    processed: Arc<AtomicU64>,
    emitted: Arc<AtomicU64>,
}

impl Analyzer {
    /// 기본 규칙 집합으로 새 분석기를 생성합니다.
    pub fn new(
        config: &PipelineConfig,
        input: mpsc::Receiver<ParsedLog>,
        output: mpsc::Sender<Alert>,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_rules(config, rules::default_rules(), input, output, cancel)
    }

    /// 지정한 규칙 집합으로 새 분석기를 생성합니다.
    ///
    /// 규칙 순서가 알림 적재 순서를 결정합니다.
    pub fn with_rules(
        config: &PipelineConfig,
        rules: Vec<Rule>,
        input: mpsc::Receiver<ParsedLog>,
        output: mpsc::Sender<Alert>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rules: Arc::new(rules),
            bloom: Arc::new(Mutex::new(BloomFilter::new(
                config.bloom_bits,
                config.bloom_hashes,
            ))),
            window: Arc::new(Mutex::new(WindowCounter::new())),
            window_len: Duration::from_secs(config.window_secs),
            input: Some(input),
            output: Some(output),
            cancel,
            tasks: Vec::new(),
            processed: Arc::new(AtomicU64::new(0)),
            emitted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 평가 루프와 윈도우 리셋 루프를 스폰합니다.
    pub async fn start(&mut self) -> Result<(), LogPipelineError> {
        let input = self
            .input
            .take()
            .ok_or_else(|| LogPipelineError::Channel("analyzer input already taken".to_owned()))?;
        let output = self
            .output
            .take()
            .ok_or_else(|| LogPipelineError::Channel("analyzer output already taken".to_owned()))?;

        self.tasks.push(tokio::spawn(evaluate_loop(
            input,
            output,
            Arc::clone(&self.rules),
            Arc::clone(&self.bloom),
            Arc::clone(&self.window),
            self.cancel.clone(),
            Arc::clone(&self.processed),
            Arc::clone(&self.emitted),
        )));

        self.tasks.push(tokio::spawn(reset_loop(
            Arc::clone(&self.window),
            self.window_len,
            self.cancel.clone(),
        )));

        info!(
            rules = self.rules.len(),
            window_secs = self.window_len.as_secs(),
            "analyzer started"
        );
        Ok(())
    }

    /// 두 태스크를 조인합니다.
    ///
    /// Q2가 닫힌 뒤, 그리고 종료 토큰이 취소된 뒤에 호출되어야 합니다.
    pub async fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        // 시작 전에 정지된 경우 남아 있는 끝단을 반납해
        // 인접 큐가 닫히도록 합니다.
        self.input = None;
        self.output = None;
        info!("analyzer stopped");
    }

    /// 지금까지 평가한 레코드 수를 반환합니다.
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// 지금까지 Q3에 적재한 알림 수를 반환합니다.
    pub fn alerts_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

/// 평가 루프 -- Q2 단독 소비자
#[allow(clippy::too_many_arguments)]
async fn evaluate_loop(
    mut input: mpsc::Receiver<ParsedLog>,
    output: mpsc::Sender<Alert>,
    rules: Arc<Vec<Rule>>,
    bloom: Arc<Mutex<BloomFilter>>,
    window: Arc<Mutex<WindowCounter>>,
    cancel: CancellationToken,
    processed: Arc<AtomicU64>,
    emitted: Arc<AtomicU64>,
) {
    while let Some(log) = input.recv().await {
        processed.fetch_add(1, Ordering::Relaxed);

        for rule in rules.iter() {
            if !rule.matches(&log) {
                continue;
            }

            let key = format!("{}:{}", rule.name(), log.source);

            // 표본을 add보다 먼저 떠서 첫 발생이 known=false가 되게 합니다.
            let known = {
                let mut filter = bloom.lock().await;
                let known = filter.contains(&key);
                filter.add(&key);
                known
            };

            let count = {
                let mut counter = window.lock().await;
                counter.increment(&key)
            };

            let alert = Alert::new(
                rule.name(),
                rule.severity(),
                log.clone(),
                AlertMetadata {
                    is_known_pattern: known,
                    count_in_window: count,
                    rule_name: rule.name().to_owned(),
                },
            );

            tokio::select! {
                biased;
                result = output.send(alert) => {
                    if result.is_err() {
                        debug!("alert queue closed, evaluation loop exiting");
                        return;
                    }
                    emitted.fetch_add(1, Ordering::Relaxed);
                }
                () = cancel.cancelled() => {
                    debug!("shutdown observed during alert send, abandoning");
                    return;
                }
            }
        }
    }
    debug!("input queue closed, evaluation loop exiting");
}

/// 윈도우 리셋 루프 -- 윈도우 길이마다 카운터를 원자적으로 비웁니다.
async fn reset_loop(window: Arc<Mutex<WindowCounter>>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // interval의 첫 tick은 즉시 발화하므로 소비하고 시작합니다.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut counter = window.lock().await;
                counter.reset();
                info!("window counters reset");
            }
            () = cancel.cancelled() => {
                debug!("window reset loop shutting down");
                break;
            }
        }
    }
}
