//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`VigilConfig`](vigil_core::config::VigilConfig)를
//! 기반으로 파이프라인 전용 설정(큐 용량)을 더해 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use vigil_core::config::VigilConfig;
//! use vigil_pipeline::config::PipelineConfig;
//!
//! let core_config = VigilConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// 로그 파이프라인 설정
///
/// core 설정에서 파생되며, 단계 간 큐 용량 등
/// 파이프라인 내부에서만 쓰이는 추가 설정을 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// HTTP 수신 바인드 주소
    pub http_bind: String,
    /// TCP 수신 바인드 주소
    pub tcp_bind: String,
    /// TCP 최대 동시 연결 수
    pub max_tcp_connections: usize,
    /// TCP 라인 최대 길이 (바이트)
    pub max_line_bytes: usize,
    /// 파서 워커 수
    pub workers: usize,
    /// 빈도 윈도우 길이 (초)
    pub window_secs: u64,
    /// Bloom 필터 비트 수
    pub bloom_bits: usize,
    /// Bloom 필터 해시 함수 수
    pub bloom_hashes: u32,
    /// 알림 파일 경로
    pub output_path: String,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// Q1 (RawLog) 큐 용량
    pub ingest_queue_capacity: usize,
    /// Q2 (ParsedLog) 큐 용량
    pub parse_queue_capacity: usize,
    /// Q3 (Alert) 큐 용량
    pub alert_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            http_bind: "0.0.0.0:8080".to_owned(),
            tcp_bind: "0.0.0.0:9090".to_owned(),
            max_tcp_connections: 256,
            max_line_bytes: 1024 * 1024, // 1MB
            workers: 4,
            window_secs: 60,
            bloom_bits: 100_000,
            bloom_hashes: 3,
            output_path: "alerts.json".to_owned(),
            ingest_queue_capacity: 1000,
            parse_queue_capacity: 1000,
            alert_queue_capacity: 100,
        }
    }
}

impl PipelineConfig {
    /// core의 `VigilConfig`에서 파이프라인 설정을 생성합니다.
    ///
    /// core 설정에 없는 큐 용량 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &vigil_core::config::VigilConfig) -> Self {
        Self {
            http_bind: core.ingest.http_bind.clone(),
            tcp_bind: core.ingest.tcp_bind.clone(),
            max_tcp_connections: core.ingest.max_tcp_connections,
            max_line_bytes: core.ingest.max_line_bytes,
            workers: core.parser.workers,
            window_secs: core.analyzer.window_secs,
            bloom_bits: core.analyzer.bloom_bits,
            bloom_hashes: core.analyzer.bloom_hashes,
            output_path: core.alerter.output_path.clone(),
            ..Self::default()
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_WORKERS: usize = 1024;
        const MAX_QUEUE_CAPACITY: usize = 1_000_000;

        if self.http_bind.is_empty() {
            return Err(LogPipelineError::Config {
                field: "http_bind".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.tcp_bind.is_empty() {
            return Err(LogPipelineError::Config {
                field: "tcp_bind".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.max_tcp_connections == 0 {
            return Err(LogPipelineError::Config {
                field: "max_tcp_connections".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_line_bytes == 0 {
            return Err(LogPipelineError::Config {
                field: "max_line_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(LogPipelineError::Config {
                field: "workers".to_owned(),
                reason: format!("must be 1-{}", MAX_WORKERS),
            });
        }

        if self.window_secs == 0 {
            return Err(LogPipelineError::Config {
                field: "window_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.bloom_bits == 0 {
            return Err(LogPipelineError::Config {
                field: "bloom_bits".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.bloom_hashes == 0 {
            return Err(LogPipelineError::Config {
                field: "bloom_hashes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.output_path.is_empty() {
            return Err(LogPipelineError::Config {
                field: "output_path".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        for (field, capacity) in [
            ("ingest_queue_capacity", self.ingest_queue_capacity),
            ("parse_queue_capacity", self.parse_queue_capacity),
            ("alert_queue_capacity", self.alert_queue_capacity),
        ] {
            if capacity == 0 || capacity > MAX_QUEUE_CAPACITY {
                return Err(LogPipelineError::Config {
                    field: field.to_owned(),
                    reason: format!("must be 1-{}", MAX_QUEUE_CAPACITY),
                });
            }
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP 바인드 주소를 설정합니다.
    pub fn http_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.http_bind = bind.into();
        self
    }

    /// TCP 바인드 주소를 설정합니다.
    pub fn tcp_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.tcp_bind = bind.into();
        self
    }

    /// 파서 워커 수를 설정합니다.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// 빈도 윈도우 길이(초)를 설정합니다.
    pub fn window_secs(mut self, secs: u64) -> Self {
        self.config.window_secs = secs;
        self
    }

    /// Bloom 필터 크기(비트)를 설정합니다.
    pub fn bloom_bits(mut self, bits: usize) -> Self {
        self.config.bloom_bits = bits;
        self
    }

    /// Bloom 필터 해시 수를 설정합니다.
    pub fn bloom_hashes(mut self, hashes: u32) -> Self {
        self.config.bloom_hashes = hashes;
        self
    }

    /// 알림 파일 경로를 설정합니다.
    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.config.output_path = path.into();
        self
    }

    /// Q1 (RawLog) 큐 용량을 설정합니다.
    pub fn ingest_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.ingest_queue_capacity = capacity;
        self
    }

    /// Q2 (ParsedLog) 큐 용량을 설정합니다.
    pub fn parse_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.parse_queue_capacity = capacity;
        self
    }

    /// Q3 (Alert) 큐 용량을 설정합니다.
    pub fn alert_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.alert_queue_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
