//! 알림 출력 -- 표준 출력 배너와 append 전용 파일 싱크
//!
//! Q3의 단독 소비자입니다. 알림마다 들여쓰기된 JSON을 만들어
//! 표준 출력(배너 + JSON + 구분선)과 설정된 파일(JSON + 개행)에
//! 기록합니다. 파일은 JSON 배열이 아니라 JSON 값의 연접
//! (JSON 시퀀스)이므로 스트리밍 파싱이 가능합니다.
//!
//! 직렬화 실패와 파일 I/O 실패는 로깅 후 해당 알림을 버리며,
//! 재시도나 재적재는 하지 않습니다.

use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info};

use vigil_core::types::Alert;

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;

/// 구분선 길이 (표준 출력)
const SEPARATOR_WIDTH: usize = 80;

/// 알림 출력기
///
/// `start()`가 출력 파일을 열고 (append-create, 0644) 소비 태스크를
/// 스폰합니다. `stop()`은 Q3가 닫힌 뒤 남은 알림을 모두 기록하고
/// 파일을 플러시합니다.
pub struct Alerter {
    output_path: String,
    input: Option<mpsc::Receiver<Alert>>,
    file: Option<Arc<Mutex<File>>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Alerter {
    /// 새 알림 출력기를 생성합니다.
    pub fn new(config: &PipelineConfig, input: mpsc::Receiver<Alert>) -> Self {
        Self {
            output_path: config.output_path.clone(),
            input: Some(input),
            file: None,
            task: None,
        }
    }

    /// 출력 파일을 열고 소비 태스크를 스폰합니다.
    pub async fn start(&mut self) -> Result<(), LogPipelineError> {
        let mut options = std::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o644);

        // 시작 시점에 한 번만 여는 동기 open입니다.
        let file = options
            .open(&self.output_path)
            .map(File::from_std)
            .map_err(|e| LogPipelineError::FileOpen {
                path: self.output_path.clone(),
                reason: e.to_string(),
            })?;

        let input = self
            .input
            .take()
            .ok_or_else(|| LogPipelineError::Channel("alerter input already taken".to_owned()))?;

        let file = Arc::new(Mutex::new(file));
        self.file = Some(Arc::clone(&file));

        self.task = Some(tokio::spawn(consume_alerts(input, file)));

        info!(path = %self.output_path, "alerter started");
        Ok(())
    }

    /// 소비 태스크를 조인하고 파일을 플러시합니다.
    ///
    /// Q3가 닫힌 뒤에 호출되어야 합니다. 태스크는 남은 알림을
    /// 모두 기록한 뒤 종료합니다.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.input = None;

        if let Some(file) = self.file.take() {
            let mut file = file.lock().await;
            if let Err(e) = file.flush().await {
                error!(error = %e, "failed to flush alert file");
            }
        }
        info!("alerter stopped");
    }

    /// 출력 파일 경로를 반환합니다.
    pub fn output_path(&self) -> &str {
        &self.output_path
    }
}

/// Q3 소비 루프 -- 채널이 닫히고 비워질 때까지 기록합니다.
async fn consume_alerts(mut input: mpsc::Receiver<Alert>, file: Arc<Mutex<File>>) {
    while let Some(alert) = input.recv().await {
        write_alert(&file, alert).await;
    }
    debug!("alert queue closed, alerter loop exiting");
}

/// 알림 하나를 두 싱크에 기록합니다.
async fn write_alert(file: &Mutex<File>, alert: Alert) {
    let json = match serde_json::to_string_pretty(&alert) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, reason = %alert.reason, "failed to serialize alert, dropping");
            return;
        }
    };

    // 표준 출력은 소비 태스크 단독이므로 잠금이 필요 없습니다.
    println!("\nALERT: {} (Severity: {})", alert.reason, alert.severity);
    println!("{json}");
    println!("{}", "-".repeat(SEPARATOR_WIDTH));

    // 파일 기록은 출력기의 뮤텍스로 직렬화됩니다.
    let mut file = file.lock().await;
    if let Err(e) = file.write_all(json.as_bytes()).await {
        error!(error = %e, "failed to write alert to file");
        return;
    }
    if let Err(e) = file.write_all(b"\n").await {
        error!(error = %e, "failed to write alert separator to file");
    }
}
