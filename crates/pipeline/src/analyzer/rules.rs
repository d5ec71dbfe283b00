//! 탐지 규칙 -- (이름, 술어, 심각도) 레코드와 기본 규칙 집합
//!
//! 규칙은 시작 시점에 등록 순서대로 고정되며 이후 변경되지 않습니다.
//! 한 레코드에 여러 규칙이 발화할 수 있고, 각 발화는 독립적인 알림을 만듭니다.

use std::fmt;

use vigil_core::types::{ParsedLog, Severity};

/// 의심 키워드 집합 (Suspicious Keywords 규칙)
pub const SUSPICIOUS_KEYWORDS: &[&str] =
    &["attack", "breach", "unauthorized", "exploit", "malicious"];

/// 탐지 규칙 -- 이름과 심각도를 가진 [`ParsedLog`] 술어
pub struct Rule {
    name: String,
    severity: Severity,
    predicate: Box<dyn Fn(&ParsedLog) -> bool + Send + Sync>,
}

impl Rule {
    /// 새 규칙을 생성합니다.
    pub fn new(
        name: impl Into<String>,
        severity: Severity,
        predicate: impl Fn(&ParsedLog) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            severity,
            predicate: Box::new(predicate),
        }
    }

    /// 규칙명을 반환합니다.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 규칙의 심각도를 반환합니다.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// 레코드가 이 규칙에 매칭되는지 평가합니다.
    pub fn matches(&self, log: &ParsedLog) -> bool {
        (self.predicate)(log)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

/// 기본 규칙 집합을 등록 순서대로 반환합니다.
///
/// 순서가 의미를 가집니다: 한 레코드에 여러 규칙이 발화하면
/// 알림은 이 순서대로 큐에 들어갑니다.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new("Critical Error Level", Severity::High, |log| {
            log.level == "CRITICAL" || log.level == "FATAL"
        }),
        Rule::new("Error Code 5xx", Severity::High, |log| {
            log.error_code.starts_with('5')
        }),
        Rule::new("Suspicious Keywords", Severity::Medium, |log| {
            log.keywords
                .iter()
                .any(|kw| SUSPICIOUS_KEYWORDS.contains(&kw.as_str()))
        }),
        Rule::new("Error Rate Threshold", Severity::Medium, |log| {
            log.level == "ERROR"
        }),
    ]
}
