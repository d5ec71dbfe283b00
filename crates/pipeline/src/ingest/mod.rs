//! 수집기 -- HTTP와 TCP 두 수신 표면에서 RawLog를 받아 Q1에 적재합니다.
//!
//! # 수신 표면
//! - [`http`]: `POST /logs`, 본문 = RawLog JSON 오브젝트 하나
//! - [`tcp`]: newline-delimited JSON, 연결당 별도 태스크
//!
//! 두 표면 모두 적재는 취소 가능한 send입니다: 적재 성공 또는 종료 관측
//! 중 하나이며, 정상 동작 중에 조용히 버려지는 레코드는 없습니다.

pub mod http;
pub mod tcp;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vigil_core::types::RawLog;

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;

use self::http::HttpState;
use self::tcp::TcpIngestSettings;

/// 수집기 -- 두 리스너의 생명주기를 관리합니다.
///
/// `start()`는 두 리스너를 모두 바인드한 뒤에야 성공합니다
/// (둘 중 하나라도 실패하면 치명적 Bind 에러). `stop()`은 리스너가
/// 닫히고 진행 중이던 연결이 모두 끝난 뒤 반환합니다.
pub struct Ingestor {
    http_bind: String,
    tcp_bind: String,
    settings: TcpIngestSettings,
    tx: Option<mpsc::Sender<RawLog>>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    http_addr: Option<SocketAddr>,
    tcp_addr: Option<SocketAddr>,
}

impl Ingestor {
    /// 새 수집기를 생성합니다.
    pub fn new(config: &PipelineConfig, tx: mpsc::Sender<RawLog>, cancel: CancellationToken) -> Self {
        Self {
            http_bind: config.http_bind.clone(),
            tcp_bind: config.tcp_bind.clone(),
            settings: TcpIngestSettings {
                max_connections: config.max_tcp_connections,
                max_line_bytes: config.max_line_bytes,
            },
            tx: Some(tx),
            cancel,
            tasks: Vec::new(),
            http_addr: None,
            tcp_addr: None,
        }
    }

    /// 두 리스너를 바인드하고 수신 태스크를 스폰합니다.
    ///
    /// 반환이 `Ok`이면 두 표면 모두 수락 중입니다.
    pub async fn start(&mut self) -> Result<(), LogPipelineError> {
        let tx = self
            .tx
            .clone()
            .ok_or_else(|| LogPipelineError::Channel("ingest queue already released".to_owned()))?;

        let http_listener =
            TcpListener::bind(&self.http_bind)
                .await
                .map_err(|e| LogPipelineError::Bind {
                    surface: "http",
                    addr: self.http_bind.clone(),
                    reason: e.to_string(),
                })?;
        let tcp_listener =
            TcpListener::bind(&self.tcp_bind)
                .await
                .map_err(|e| LogPipelineError::Bind {
                    surface: "tcp",
                    addr: self.tcp_bind.clone(),
                    reason: e.to_string(),
                })?;

        let http_addr = http_listener.local_addr().map_err(LogPipelineError::Io)?;
        let tcp_addr = tcp_listener.local_addr().map_err(LogPipelineError::Io)?;
        self.http_addr = Some(http_addr);
        self.tcp_addr = Some(tcp_addr);

        let http_state = HttpState {
            tx: tx.clone(),
            cancel: self.cancel.clone(),
        };
        self.tasks
            .push(tokio::spawn(http::serve(http_listener, http_state)));

        self.tasks.push(tokio::spawn(tcp::serve(
            tcp_listener,
            tx,
            self.cancel.clone(),
            self.settings.clone(),
        )));

        info!(http = %http_addr, tcp = %tcp_addr, "ingestor listening");
        Ok(())
    }

    /// 수신 태스크를 조인하고 Q1 송신측을 반납합니다.
    ///
    /// 종료 토큰이 먼저 취소되어 있어야 합니다. 반환 시점에는
    /// 수집기가 보유하던 모든 Q1 Sender가 드롭되어 있습니다.
    pub async fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        // 마지막 남은 수집기 측 Sender를 드롭합니다.
        // 드라이버가 Sender를 따로 쥐지 않으므로 여기서 Q1이 닫힙니다.
        self.tx = None;
        info!("ingestor stopped");
    }

    /// 실제 바인드된 HTTP 주소를 반환합니다 (시작 전에는 None).
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// 실제 바인드된 TCP 주소를 반환합니다 (시작 전에는 None).
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            http_bind: "127.0.0.1:0".to_owned(),
            tcp_bind: "127.0.0.1:0".to_owned(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn start_binds_both_listeners() {
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let mut ingestor = Ingestor::new(&test_config(), tx, cancel.clone());

        ingestor.start().await.unwrap();
        assert!(ingestor.http_addr().is_some());
        assert!(ingestor.tcp_addr().is_some());

        cancel.cancel();
        ingestor.stop().await;
    }

    #[tokio::test]
    async fn start_fails_on_unbindable_address() {
        let (tx, _rx) = mpsc::channel(16);
        let config = PipelineConfig {
            // TEST-NET 주소는 로컬 인터페이스에 없으므로 바인드가 실패합니다.
            http_bind: "192.0.2.1:0".to_owned(),
            tcp_bind: "127.0.0.1:0".to_owned(),
            ..Default::default()
        };
        let mut ingestor = Ingestor::new(&config, tx, CancellationToken::new());

        let result = ingestor.start().await;
        assert!(matches!(
            result,
            Err(LogPipelineError::Bind { surface: "http", .. })
        ));
    }

    #[tokio::test]
    async fn stop_closes_ingest_queue() {
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let mut ingestor = Ingestor::new(&test_config(), tx, cancel.clone());
        ingestor.start().await.unwrap();

        let tcp_addr = ingestor.tcp_addr().unwrap();
        let mut stream = TcpStream::connect(tcp_addr).await.unwrap();
        stream
            .write_all(
                b"{\"timestamp\":\"t\",\"level\":\"INFO\",\"source\":\"s\",\"message\":\"m\"}\n",
            )
            .await
            .unwrap();

        let raw = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.source, "s");

        cancel.cancel();
        ingestor.stop().await;

        // 수집기가 정지하면 모든 Sender가 드롭되어 Q1이 닫힙니다.
        assert!(rx.recv().await.is_none());
    }
}
