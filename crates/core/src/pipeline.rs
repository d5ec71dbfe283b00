//! 파이프라인 trait — 모듈 생명주기 정의
//!
//! [`Pipeline`] trait은 데몬이 관리하는 모듈의 생명주기 인터페이스입니다.
//! vigil-pipeline의 `LogPipeline`이 이 trait을 구현하여
//! `vigil-daemon`에서 시작/정지/상태 확인됩니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VigilError;

/// 파이프라인 모듈이 구현하는 생명주기 trait
///
/// # 구현 예시
/// ```ignore
/// impl Pipeline for LogPipeline {
///     async fn start(&mut self) -> Result<(), VigilError> {
///         // 채널 연결, 태스크 스폰 등
///         Ok(())
///     }
///
///     async fn stop(&mut self) -> Result<(), VigilError> {
///         // 순서 보장 graceful shutdown
///         Ok(())
///     }
///
///     async fn health_check(&self) -> HealthStatus {
///         HealthStatus::Healthy
///     }
/// }
/// ```
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다.
    ///
    /// 리소스 초기화, 워커 스폰, 채널 연결 등을 수행합니다.
    /// 이미 실행 중인 경우 `PipelineError::AlreadyRunning`을 반환합니다.
    fn start(&mut self) -> impl std::future::Future<Output = Result<(), VigilError>> + Send;

    /// 모듈을 정지합니다.
    ///
    /// Graceful shutdown을 수행합니다.
    /// 진행 중인 레코드를 드레인한 뒤 리소스를 정리합니다.
    fn stop(&mut self) -> impl std::future::Future<Output = Result<(), VigilError>> + Send;

    /// 모듈의 현재 상태를 확인합니다.
    fn health_check(&self) -> impl std::future::Future<Output = HealthStatus> + Send;
}

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 성능 저하 또는 부분적 장애 (서비스는 계속 동작)
    Degraded(String),
    /// 비정상 — 서비스 불가 상태
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}
