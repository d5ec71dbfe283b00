//! 파이프라인 오케스트레이션 -- 수집/파싱/분석/알림 네 단계의 전체 흐름
//!
//! [`LogPipeline`]은 세 개의 bounded 큐(Q1/Q2/Q3)와 전역 종료 토큰을
//! 소유하고, core의 [`Pipeline`] trait을 구현하여 `vigil-daemon`에서
//! 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! Ingestor -- Q1 --> ParserPool -- Q2 --> Analyzer -- Q3 --> Alerter
//! ```
//!
//! # 종료 순서 (권위 있는 시퀀스)
//! 1. 종료 토큰 취소
//! 2. Ingestor 정지 (리스너 닫힘, 수집기 측 Sender 드롭 -> Q1 닫힘)
//! 3. ParserPool 조인 (Q1 드레인 후 워커 종료 -> Q2 닫힘)
//! 4. Analyzer 조인 (Q2 드레인, 티커 정지 -> Q3 닫힘)
//! 5. Alerter 조인 (Q3 드레인, 파일 플러시/닫기)
//!
//! 이 순서는 닫힌 큐에 대한 적재가 일어나지 않음을 보장하며,
//! 대기 중인 레코드는 파이프라인 종료 전에 끝까지 처리됩니다.

use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vigil_core::error::{PipelineError, VigilError};
use vigil_core::pipeline::{HealthStatus, Pipeline};
use vigil_core::types::{Alert, ParsedLog, RawLog};

use crate::alerter::Alerter;
use crate::analyzer::Analyzer;
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::ingest::Ingestor;
use crate::parser::ParserPool;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨 (재시작 불가)
    Stopped,
}

/// 로그 파이프라인 -- 네 단계의 조립과 생명주기를 관리합니다.
///
/// 각 단계는 자신의 큐 끝단만 보유하며 단계 간 공유 가변 상태는
/// 큐 자체뿐입니다. 큐 닫힘은 Sender 드롭으로 자연스럽게 전파됩니다.
pub struct LogPipeline {
    config: PipelineConfig,
    state: PipelineState,
    cancel: CancellationToken,
    ingestor: Ingestor,
    parser: ParserPool,
    analyzer: Analyzer,
    alerter: Alerter,
}

impl LogPipeline {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 실제 바인드된 HTTP 주소를 반환합니다 (시작 전에는 None).
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.ingestor.http_addr()
    }

    /// 실제 바인드된 TCP 주소를 반환합니다 (시작 전에는 None).
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.ingestor.tcp_addr()
    }

    /// 분석기가 평가한 레코드 수를 반환합니다.
    pub fn processed_count(&self) -> u64 {
        self.analyzer.processed_count()
    }

    /// 분석기가 적재한 알림 수를 반환합니다.
    pub fn alerts_emitted(&self) -> u64 {
        self.analyzer.alerts_emitted()
    }

    /// 알림 파일 경로를 반환합니다.
    pub fn output_path(&self) -> &str {
        self.alerter.output_path()
    }

    /// 설정을 반환합니다.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Pipeline for LogPipeline {
    /// 소비자부터 생산자 순서로 네 단계를 시작합니다.
    ///
    /// 중간 단계가 실패하면 이미 시작된 단계를 종료 순서대로 되돌리고
    /// 에러를 전파합니다. 정지된 파이프라인은 재시작할 수 없습니다.
    async fn start(&mut self) -> Result<(), VigilError> {
        match self.state {
            PipelineState::Running => {
                return Err(PipelineError::AlreadyRunning.into());
            }
            PipelineState::Stopped => {
                return Err(PipelineError::InitFailed(
                    "pipeline is not restartable once stopped".to_owned(),
                )
                .into());
            }
            PipelineState::Initialized => {}
        }

        info!("starting log pipeline");

        // 소비자 먼저: 시작 실패가 레코드를 고립시키지 않도록 합니다.
        if let Err(e) = self.alerter.start().await {
            self.rollback().await;
            return Err(e.into());
        }
        if let Err(e) = self.analyzer.start().await {
            self.rollback().await;
            return Err(e.into());
        }
        if let Err(e) = self.parser.start().await {
            self.rollback().await;
            return Err(e.into());
        }
        if let Err(e) = self.ingestor.start().await {
            self.rollback().await;
            return Err(e.into());
        }

        self.state = PipelineState::Running;
        info!("log pipeline started");
        Ok(())
    }

    /// 권위 있는 종료 시퀀스를 수행합니다.
    async fn stop(&mut self) -> Result<(), VigilError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping log pipeline");
        self.cancel.cancel();

        // 1. 수집기: 리스너 닫힘, 연결 종료, Q1 닫힘
        self.ingestor.stop().await;
        // 2. 파서: Q1 드레인 후 워커 종료, Q2 닫힘
        self.parser.stop().await;
        // 3. 분석기: Q2 드레인, 티커 정지, Q3 닫힘
        self.analyzer.stop().await;
        // 4. 알림 출력기: Q3 드레인, 파일 닫기
        self.alerter.stop().await;

        self.state = PipelineState::Stopped;
        info!(
            processed = self.analyzer.processed_count(),
            alerts = self.analyzer.alerts_emitted(),
            "log pipeline stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => HealthStatus::Healthy,
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

impl LogPipeline {
    /// 시작 실패 시 이미 시작된 단계를 종료 순서대로 되돌립니다.
    async fn rollback(&mut self) {
        warn!("pipeline startup failed, rolling back started stages");
        self.cancel.cancel();
        self.ingestor.stop().await;
        self.parser.stop().await;
        self.analyzer.stop().await;
        self.alerter.stop().await;
        self.state = PipelineState::Stopped;
    }
}

/// 로그 파이프라인 빌더
///
/// 큐를 생성하고 각 단계에 끝단을 분배합니다.
pub struct LogPipelineBuilder {
    config: PipelineConfig,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// 설정 검증 후 Q1/Q2/Q3와 네 단계를 생성합니다.
    /// 큐의 Sender는 각 생산 단계만 보유하므로, 단계 종료가
    /// 곧 다운스트림 큐 닫힘으로 이어집니다.
    pub fn build(self) -> Result<LogPipeline, LogPipelineError> {
        self.config.validate()?;

        let cancel = CancellationToken::new();

        let (q1_tx, q1_rx) = mpsc::channel::<RawLog>(self.config.ingest_queue_capacity);
        let (q2_tx, q2_rx) = mpsc::channel::<ParsedLog>(self.config.parse_queue_capacity);
        let (q3_tx, q3_rx) = mpsc::channel::<Alert>(self.config.alert_queue_capacity);

        let ingestor = Ingestor::new(&self.config, q1_tx, cancel.clone());
        let parser = ParserPool::new(self.config.workers, q1_rx, q2_tx, cancel.clone())?;
        let analyzer = Analyzer::new(&self.config, q2_rx, q3_tx, cancel.clone());
        let alerter = Alerter::new(&self.config, q3_rx);

        Ok(LogPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            cancel,
            ingestor,
            parser,
            analyzer,
            alerter,
        })
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
