//! 파서 -- RawLog를 ParsedLog로 변환하는 워커 풀
//!
//! [`FieldExtractor`]는 메시지에서 IP, 에러 코드, 키워드를 추출하는
//! 순수 함수이며, 정규식은 생성 시점에 한 번 컴파일됩니다.
//! [`ParserPool`]은 고정 수의 워커 태스크가 Q1을 공유 소비하고
//! 결과를 Q2로 전달합니다. 워커 간 공유 가변 상태는 없습니다.

use std::sync::Arc;

use regex::Regex;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use vigil_core::types::{ParsedLog, RawLog};

use crate::error::LogPipelineError;

/// IPv4 dotted-quad 패턴
const IP_PATTERN: &str = r"\b(?:\d{1,3}\.){3}\d{1,3}\b";
/// 에러 코드 토큰 패턴 (레벨 토큰 또는 4xx/5xx 코드)
const ERROR_CODE_PATTERN: &str = r"\b(?:ERROR|FATAL|CRITICAL|[45]\d{2})\b";
/// 키워드 토큰 양 끝에서 제거하는 구두점 집합
const PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];
/// 키워드로 유지되는 최소 토큰 길이 초과 기준
const MIN_KEYWORD_LEN: usize = 3;

/// 필드 추출기 -- 결정적이고 순수한 RawLog -> ParsedLog 변환
pub struct FieldExtractor {
    ip_regex: Regex,
    error_regex: Regex,
}

impl FieldExtractor {
    /// 정규식을 컴파일하여 새 추출기를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            ip_regex: Regex::new(IP_PATTERN)?,
            error_regex: Regex::new(ERROR_CODE_PATTERN)?,
        })
    }

    /// 원시 레코드에서 파생 필드를 추출합니다.
    ///
    /// 원본 네 필드(timestamp, level, source, message)는
    /// 바이트 동일하게 보존됩니다.
    pub fn extract(&self, raw: RawLog) -> ParsedLog {
        let ip = self
            .ip_regex
            .find(&raw.message)
            .map(|m| m.as_str().to_owned())
            .unwrap_or_default();

        let error_code = self
            .error_regex
            .find(&raw.message)
            .map(|m| m.as_str().to_owned())
            .unwrap_or_default();

        let keywords = extract_keywords(&raw.message);

        ParsedLog {
            timestamp: raw.timestamp,
            level: raw.level,
            source: raw.source,
            message: raw.message,
            ip,
            error_code,
            keywords,
        }
    }
}

/// 메시지를 공백으로 분리하고, 구두점을 다듬은 뒤 소문자화하여
/// 길이가 3을 초과하는 토큰만 순서/중복 보존으로 반환합니다.
fn extract_keywords(message: &str) -> Vec<String> {
    message
        .split_whitespace()
        .map(|word| word.trim_matches(PUNCTUATION).to_lowercase())
        .filter(|word| word.len() > MIN_KEYWORD_LEN)
        .collect()
}

/// 파서 워커 풀
///
/// `start()`가 N개의 워커 태스크를 스폰하고, `stop()`이 조인합니다.
/// Q1이 닫히고 비워지면 워커는 스스로 종료합니다. 종료 신호가 오면
/// 진행 중인 Q2 전송은 즉시 중단됩니다.
pub struct ParserPool {
    workers: usize,
    extractor: Arc<FieldExtractor>,
    input: Option<mpsc::Receiver<RawLog>>,
    output: Option<mpsc::Sender<ParsedLog>>,
    cancel: CancellationToken,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl ParserPool {
    /// 새 워커 풀을 생성합니다.
    pub fn new(
        workers: usize,
        input: mpsc::Receiver<RawLog>,
        output: mpsc::Sender<ParsedLog>,
        cancel: CancellationToken,
    ) -> Result<Self, LogPipelineError> {
        Ok(Self {
            workers,
            extractor: Arc::new(FieldExtractor::new()?),
            input: Some(input),
            output: Some(output),
            cancel,
            handles: Vec::new(),
        })
    }

    /// 워커 태스크를 스폰합니다.
    pub async fn start(&mut self) -> Result<(), LogPipelineError> {
        let input = self
            .input
            .take()
            .ok_or_else(|| LogPipelineError::Channel("parser input already taken".to_owned()))?;
        let output = self
            .output
            .take()
            .ok_or_else(|| LogPipelineError::Channel("parser output already taken".to_owned()))?;

        let input = Arc::new(Mutex::new(input));

        for id in 0..self.workers {
            let input = Arc::clone(&input);
            let output = output.clone();
            let extractor = Arc::clone(&self.extractor);
            let cancel = self.cancel.clone();

            self.handles.push(tokio::spawn(async move {
                worker_loop(id, input, output, extractor, cancel).await;
            }));
        }

        // 풀이 보유한 원본 Sender는 여기서 드롭됩니다.
        // 모든 워커가 종료되면 Q2가 닫힙니다.
        drop(output);

        tracing::info!(workers = self.workers, "parser workers started");
        Ok(())
    }

    /// 워커를 조인합니다.
    ///
    /// Q1이 닫힌 뒤에 호출되어야 합니다. 워커는 Q1을 드레인하고 종료합니다.
    pub async fn stop(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        // 시작 전에 정지된 경우 남아 있는 끝단을 반납해
        // 인접 큐가 닫히도록 합니다.
        self.input = None;
        self.output = None;
        tracing::info!("parser stopped");
    }
}

/// 단일 워커 루프
///
/// Q1 수신은 공유 Receiver의 잠금을 잡고 수행합니다. Q1이 닫히고
/// 비워지면 `recv()`가 `None`을 반환하여 루프가 종료됩니다.
async fn worker_loop(
    id: usize,
    input: Arc<Mutex<mpsc::Receiver<RawLog>>>,
    output: mpsc::Sender<ParsedLog>,
    extractor: Arc<FieldExtractor>,
    cancel: CancellationToken,
) {
    loop {
        let entry = {
            let mut rx = input.lock().await;
            rx.recv().await
        };

        let Some(entry) = entry else {
            debug!(worker = id, "input queue closed, worker exiting");
            break;
        };

        let parsed = extractor.extract(entry);

        tokio::select! {
            biased;
            result = output.send(parsed) => {
                if result.is_err() {
                    debug!(worker = id, "output queue closed, worker exiting");
                    break;
                }
            }
            () = cancel.cancelled() => {
                debug!(worker = id, "shutdown observed during send, worker exiting");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(message: &str) -> RawLog {
        RawLog {
            timestamp: "2024-01-15T10:30:00Z".to_owned(),
            level: "INFO".to_owned(),
            source: "test".to_owned(),
            message: message.to_owned(),
        }
    }

    fn extractor() -> FieldExtractor {
        FieldExtractor::new().unwrap()
    }

    #[test]
    fn passthrough_fields_are_preserved() {
        let input = RawLog {
            timestamp: "2024-01-15T10:30:00Z".to_owned(),
            level: "FATAL".to_owned(),
            source: "db".to_owned(),
            message: "Security breach from 10.0.0.1".to_owned(),
        };
        let parsed = extractor().extract(input.clone());
        assert_eq!(parsed.timestamp, input.timestamp);
        assert_eq!(parsed.level, input.level);
        assert_eq!(parsed.source, input.source);
        assert_eq!(parsed.message, input.message);
    }

    #[test]
    fn ip_extraction_takes_leftmost_match() {
        let parsed = extractor().extract(raw("from 192.168.1.10 to 10.0.0.1"));
        assert_eq!(parsed.ip, "192.168.1.10");
    }

    #[test]
    fn ip_empty_when_no_dotted_quad() {
        let parsed = extractor().extract(raw("no addresses here"));
        assert_eq!(parsed.ip, "");
    }

    #[test]
    fn error_code_matches_http_codes() {
        let parsed = extractor().extract(raw("upstream returned 503 timeout"));
        assert_eq!(parsed.error_code, "503");

        let parsed = extractor().extract(raw("got 404 then 500"));
        assert_eq!(parsed.error_code, "404");
    }

    #[test]
    fn error_code_matches_level_tokens_in_message() {
        // 레벨 토큰이 메시지에 나타나면 에러 코드로도 분류됩니다 (의도된 동작).
        let parsed = extractor().extract(raw("FATAL disk failure"));
        assert_eq!(parsed.error_code, "FATAL");
    }

    #[test]
    fn error_code_ignores_non_4xx_5xx_numbers() {
        let parsed = extractor().extract(raw("status 200 and 301 are fine"));
        assert_eq!(parsed.error_code, "");
    }

    #[test]
    fn error_code_requires_word_boundary() {
        let parsed = extractor().extract(raw("id 15031 is not a code"));
        assert_eq!(parsed.error_code, "");
    }

    #[test]
    fn keywords_are_lowercased_and_trimmed() {
        let parsed = extractor().extract(raw("Security BREACH detected!"));
        assert_eq!(parsed.keywords, vec!["security", "breach", "detected"]);
    }

    #[test]
    fn keywords_shorter_than_four_chars_dropped() {
        let parsed = extractor().extract(raw("the db is down now"));
        assert_eq!(parsed.keywords, vec!["down"]);
    }

    #[test]
    fn keyword_length_checked_after_trimming() {
        // "now!!" -> "now" (3자) 는 탈락
        let parsed = extractor().extract(raw("now!! failing"));
        assert_eq!(parsed.keywords, vec!["failing"]);
    }

    #[test]
    fn keywords_preserve_duplicates_and_order() {
        let parsed = extractor().extract(raw("error error again error"));
        assert_eq!(parsed.keywords, vec!["error", "error", "again", "error"]);
    }

    #[test]
    fn keyword_extraction_is_idempotent() {
        let first = extract_keywords("Attack detected, breach; unauthorized!");
        let rejoined = first.join(" ");
        let second = extract_keywords(&rejoined);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_message_yields_empty_fields() {
        let parsed = extractor().extract(raw(""));
        assert_eq!(parsed.ip, "");
        assert_eq!(parsed.error_code, "");
        assert!(parsed.keywords.is_empty());
    }

    #[tokio::test]
    async fn pool_parses_records_end_to_end() {
        let (q1_tx, q1_rx) = mpsc::channel(16);
        let (q2_tx, mut q2_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let mut pool = ParserPool::new(2, q1_rx, q2_tx, cancel).unwrap();
        pool.start().await.unwrap();

        for i in 0..5 {
            q1_tx
                .send(raw(&format!("request {i} from 10.0.0.{i} failed with 502")))
                .await
                .unwrap();
        }
        drop(q1_tx);
        pool.stop().await;

        let mut parsed = Vec::new();
        while let Some(log) = q2_rx.recv().await {
            parsed.push(log);
        }
        assert_eq!(parsed.len(), 5);
        for log in &parsed {
            assert_eq!(log.error_code, "502");
            assert!(log.ip.starts_with("10.0.0."));
        }
    }

    #[tokio::test]
    async fn workers_exit_when_input_closes() {
        let (q1_tx, q1_rx) = mpsc::channel::<RawLog>(4);
        let (q2_tx, _q2_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        let mut pool = ParserPool::new(4, q1_rx, q2_tx, cancel).unwrap();
        pool.start().await.unwrap();

        drop(q1_tx);

        // 입력이 닫혔으므로 조인은 즉시 끝나야 합니다.
        tokio::time::timeout(std::time::Duration::from_secs(5), pool.stop())
            .await
            .expect("workers did not exit after input close");
    }

    #[tokio::test]
    async fn blocked_send_yields_on_shutdown() {
        let (q1_tx, q1_rx) = mpsc::channel(4);
        // 용량 1 큐를 미리 채워 워커의 전송을 블록시킵니다.
        let (q2_tx, _q2_rx) = mpsc::channel(1);
        q2_tx
            .send(extractor().extract(raw("pre-filled")))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let mut pool = ParserPool::new(1, q1_rx, q2_tx, cancel.clone()).unwrap();
        pool.start().await.unwrap();

        q1_tx.send(raw("stuck record")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        cancel.cancel();
        drop(q1_tx);

        tokio::time::timeout(std::time::Duration::from_secs(5), pool.stop())
            .await
            .expect("worker did not yield blocked send on shutdown");
    }
}
