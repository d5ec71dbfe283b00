//! vigil-pipeline — 스트리밍 로그 이상 탐지 파이프라인
//!
//! # 모듈 구성
//!
//! - [`ingest`]: HTTP / TCP 두 표면에서 RawLog 수집
//! - [`parser`]: 파생 필드 추출 (IP, 에러 코드, 키워드) 워커 풀
//! - [`analyzer`]: 규칙 평가 + Bloom 필터 + 윈도우 카운터
//! - [`alerter`]: 표준 출력과 append 파일로 알림 기록
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Ingestor -- Q1 --> ParserPool -- Q2 --> Analyzer -- Q3 --> Alerter
//!   |                   |                    |                 |
//! HTTP/TCP           regex 추출        규칙 + Bloom/윈도우   stdout + 파일
//! ```
//!
//! 세 큐는 모두 bounded이며, 모든 블로킹 지점(적재, 수신, 네트워크
//! 수락/읽기)은 전역 종료 토큰과의 select로 취소 가능합니다.

pub mod alerter;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod ingest;
pub mod parser;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 수집기
pub use ingest::Ingestor;

// 파서
pub use parser::{FieldExtractor, ParserPool};

// 분석기
pub use analyzer::Analyzer;
pub use analyzer::bloom::BloomFilter;
pub use analyzer::rules::{Rule, SUSPICIOUS_KEYWORDS, default_rules};
pub use analyzer::window::WindowCounter;

// 알림 출력
pub use alerter::Alerter;
