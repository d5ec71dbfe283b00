//! 도메인 타입 — 파이프라인 전 단계에서 사용되는 공통 타입
//!
//! 수집기가 받는 [`RawLog`], 파서가 만드는 [`ParsedLog`],
//! 분석기가 만드는 [`Alert`]를 정의합니다. 단계 간 통신은
//! 이 타입들을 bounded mpsc 채널로 전달하는 방식으로만 수행됩니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 원시 로그 레코드 — 네트워크로 수신한 디코딩 직후의 입력
///
/// 와이어 형식은 소문자 키의 JSON 오브젝트 하나입니다.
/// 네 필드 모두 불투명 문자열이며 파이프라인은 값을 변형하지 않고 전달합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    /// 발생 시각 (불투명, 그대로 전달)
    pub timestamp: String,
    /// 로그 레벨 (INFO, WARN, ERROR, CRITICAL, FATAL — 대소문자 구분)
    pub level: String,
    /// 논리적 생산자 식별자
    pub source: String,
    /// 자유 텍스트 메시지
    pub message: String,
}

impl fmt::Display for RawLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.source, self.message)
    }
}

/// 파싱된 로그 레코드 — [`RawLog`]에 파생 필드를 더한 분석용 레코드
///
/// 알림 파일 스키마가 요구하는 키 표기(PascalCase, `IP`)를 그대로
/// 직렬화 형식으로 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParsedLog {
    /// 원본 타임스탬프 (바이트 동일 보존)
    pub timestamp: String,
    /// 원본 로그 레벨
    pub level: String,
    /// 원본 소스
    pub source: String,
    /// 원본 메시지
    pub message: String,
    /// 메시지에서 추출한 첫 IPv4 주소, 없으면 빈 문자열
    #[serde(rename = "IP")]
    pub ip: String,
    /// 메시지에서 추출한 첫 에러 코드 토큰, 없으면 빈 문자열
    pub error_code: String,
    /// 소문자 키워드 시퀀스 (순서/중복 보존)
    pub keywords: Vec<String>,
}

impl fmt::Display for ParsedLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ip={} code={} keywords={}",
            self.level,
            self.source,
            if self.ip.is_empty() { "-" } else { &self.ip },
            if self.error_code.is_empty() {
                "-"
            } else {
                &self.error_code
            },
            self.keywords.len(),
        )
    }
}

/// 알림 심각도
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Low < Medium < High`).
/// 직렬화 표기는 와이어 스키마에 맞춘 대문자입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도 — 즉시 확인 필요
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// 알림 메타데이터 — 패턴/빈도 부가 정보
///
/// 분석기가 매 알림마다 채우는 세 필드로 구성됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMetadata {
    /// Bloom 필터가 이 (규칙, 소스) 키를 이전에 본 적이 있는지
    pub is_known_pattern: bool,
    /// 현재 윈도우에서 이 키가 증가된 횟수 (1 이상)
    pub count_in_window: u64,
    /// 발화한 규칙명
    pub rule_name: String,
}

/// 탐지 알림 — 규칙 발화로 생성되는 구조화 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// 알림 생성 시각 (RFC3339)
    pub timestamp: DateTime<Utc>,
    /// 심각도
    pub severity: Severity,
    /// 발화 사유 (규칙명)
    pub reason: String,
    /// 알림을 유발한 파싱 레코드
    pub log: ParsedLog,
    /// 패턴/빈도 메타데이터
    pub metadata: AlertMetadata,
}

impl Alert {
    /// 생성 시각을 현재로 찍어 새 알림을 만듭니다.
    pub fn new(
        reason: impl Into<String>,
        severity: Severity,
        log: ParsedLog,
        metadata: AlertMetadata,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            reason: reason.into(),
            log,
            metadata,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} source={} count={}",
            self.severity, self.reason, self.log.source, self.metadata.count_in_window,
        )
    }
}
