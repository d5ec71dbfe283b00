//! 설정 관리 — vigil.toml 파싱 및 기본값
//!
//! 모든 필드에 내장 기본값이 있으므로, 설정 파일이 없거나
//! 일부 섹션만 있어도 파이프라인은 기본값으로 동작합니다.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Vigil 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집기 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// 파서 설정
    #[serde(default)]
    pub parser: ParserConfig,
    /// 분석기 설정
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// 알림 출력 설정
    #[serde(default)]
    pub alerter: AlerterConfig,
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 수집기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// HTTP 수신 바인드 주소
    pub http_bind: String,
    /// TCP 수신 바인드 주소
    pub tcp_bind: String,
    /// TCP 최대 동시 연결 수
    pub max_tcp_connections: usize,
    /// TCP 라인 최대 길이 (바이트)
    pub max_line_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            http_bind: "0.0.0.0:8080".to_owned(),
            tcp_bind: "0.0.0.0:9090".to_owned(),
            max_tcp_connections: 256,
            max_line_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// 파서 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// 워커 태스크 수
    pub workers: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// 분석기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// 빈도 윈도우 길이 (초)
    pub window_secs: u64,
    /// Bloom 필터 비트 수
    pub bloom_bits: usize,
    /// Bloom 필터 해시 함수 수
    pub bloom_hashes: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            bloom_bits: 100_000,
            bloom_hashes: 3,
        }
    }
}

/// 알림 출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlerterConfig {
    /// 알림 파일 경로 (append-only JSON 시퀀스)
    pub output_path: String,
}

impl Default for AlerterConfig {
    fn default() -> Self {
        Self {
            output_path: "alerts.json".to_owned(),
        }
    }
}

impl VigilConfig {
    /// TOML 설정 파일을 읽어 설정을 생성합니다.
    ///
    /// 파일에 없는 섹션/필드는 기본값이 적용됩니다.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::ParseFailed {
                    reason: format!("{}: {}", path.display(), e),
                }
            }
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.log_format != "json" && self.general.log_format != "pretty" {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("'{}' is not 'json' or 'pretty'", self.general.log_format),
            });
        }

        if self.ingest.http_bind.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ingest.http_bind".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.ingest.tcp_bind.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ingest.tcp_bind".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.ingest.max_tcp_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.max_tcp_connections".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.ingest.max_line_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.max_line_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.parser.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "parser.workers".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.analyzer.window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analyzer.window_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.analyzer.bloom_bits == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analyzer.bloom_bits".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.analyzer.bloom_hashes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analyzer.bloom_hashes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.alerter.output_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "alerter.output_path".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}
