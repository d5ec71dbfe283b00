//! TCP 수집 표면 -- newline-delimited JSON
//!
//! 임의의 클라이언트 연결을 수락하고, 각 연결을 별도 태스크에서 처리합니다.
//! 프레이밍은 개행으로 끝나는 한 줄당 [`RawLog`] JSON 오브젝트 하나이며,
//! 길이 접두사나 핸드셰이크, 응답 바이트는 없습니다.
//!
//! 잘못된 라인은 로깅 후 건너뛰며 연결은 유지됩니다. 종료 신호가 오면
//! 리스너는 수락을 멈추고, 진행 중인 연결은 피어가 닫거나 다음 적재
//! 시도가 종료 신호를 관측할 때 끝납니다.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigil_core::types::RawLog;

/// TCP 수집 표면 런타임 파라미터
#[derive(Debug, Clone)]
pub struct TcpIngestSettings {
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 라인 최대 길이 (바이트). 초과 시 해당 연결을 닫습니다.
    pub max_line_bytes: usize,
}

/// 바인드된 리스너 위에서 수락 루프를 실행합니다.
///
/// 종료 토큰이 취소되면 수락을 멈추고, 모든 연결 핸들러가
/// 끝나기를 기다린 뒤 반환합니다.
pub async fn serve(
    listener: TcpListener,
    tx: mpsc::Sender<RawLog>,
    cancel: CancellationToken,
    settings: TcpIngestSettings,
) {
    let connection_permits = Arc::new(Semaphore::new(settings.max_connections));

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "tcp accept error");
                        continue;
                    }
                };

                let permit = match Arc::clone(&connection_permits).try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!(peer = %peer, "max tcp connections reached, rejecting connection");
                        continue;
                    }
                };

                debug!(peer = %peer, "accepted tcp connection");

                let tx = tx.clone();
                let cancel = cancel.clone();
                let max_line_bytes = settings.max_line_bytes;
                tokio::spawn(async move {
                    handle_connection(stream, peer.to_string(), tx, cancel, max_line_bytes).await;
                    drop(permit);
                });
            }
            () = cancel.cancelled() => {
                info!("tcp listener received shutdown signal");
                break;
            }
        }
    }

    // 남은 연결 핸들러가 모두 permit을 반환할 때까지 대기합니다.
    let all = u32::try_from(settings.max_connections).unwrap_or(u32::MAX);
    let _ = connection_permits.acquire_many(all).await;
    debug!("all tcp connections drained");
}

/// 단일 연결을 처리합니다: 라인 단위로 읽어 디코딩하고 Q1에 적재합니다.
///
/// 라인 길이 제한은 읽기 계층에서 적용됩니다: 각 라인은
/// `max_line_bytes + 1` 바이트로 제한된 reader를 통해 읽으므로,
/// 개행 없는 과대 입력도 그 이상 메모리에 쌓이지 않습니다.
/// 제한에 걸린 연결은 닫습니다.
async fn handle_connection(
    stream: TcpStream,
    peer: String,
    tx: mpsc::Sender<RawLog>,
    cancel: CancellationToken,
    max_line_bytes: usize,
) {
    let mut reader = BufReader::new(stream);
    let mut line: Vec<u8> = Vec::new();

    loop {
        line.clear();
        // 라인당 읽기 상한: 초과 여부를 판별할 1바이트 여유를 둡니다.
        let mut limited = (&mut reader).take(max_line_bytes as u64 + 1);

        tokio::select! {
            result = limited.read_until(b'\n', &mut line) => {
                match result {
                    Ok(0) => {
                        debug!(peer = %peer, "connection closed by peer");
                        break;
                    }
                    Ok(_) => {
                        let terminated = line.last() == Some(&b'\n');
                        if !terminated && line.len() > max_line_bytes {
                            warn!(
                                peer = %peer,
                                max = max_line_bytes,
                                "line exceeds max size, closing connection"
                            );
                            break;
                        }

                        let trimmed = line.trim_ascii();
                        if trimmed.is_empty() {
                            continue;
                        }

                        let raw: RawLog = match serde_json::from_slice(trimmed) {
                            Ok(raw) => raw,
                            Err(e) => {
                                // 잘못된 라인은 건너뛰고 연결은 유지합니다.
                                warn!(peer = %peer, error = %e, "malformed log line skipped");
                                continue;
                            }
                        };

                        tokio::select! {
                            biased;
                            result = tx.send(raw) => {
                                if result.is_err() {
                                    debug!(peer = %peer, "ingest queue closed, dropping connection");
                                    return;
                                }
                            }
                            () = cancel.cancelled() => {
                                debug!(peer = %peer, "shutdown observed during enqueue, dropping connection");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "tcp read error");
                        break;
                    }
                }
            }
            () = cancel.cancelled() => {
                debug!(peer = %peer, "connection handler received shutdown signal");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn settings() -> TcpIngestSettings {
        TcpIngestSettings {
            max_connections: 16,
            max_line_bytes: 64 * 1024,
        }
    }

    async fn spawn_server(
        capacity: usize,
    ) -> (
        std::net::SocketAddr,
        mpsc::Receiver<RawLog>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, tx, cancel.clone(), settings()));
        (addr, rx, cancel, handle)
    }

    #[tokio::test]
    async fn valid_line_is_enqueued() {
        let (addr, mut rx, cancel, handle) = spawn_server(16).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"{\"timestamp\":\"t\",\"level\":\"ERROR\",\"source\":\"tcp\",\"message\":\"m\"}\n",
            )
            .await
            .unwrap();

        let raw = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.source, "tcp");

        drop(stream);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_line_keeps_connection_open() {
        let (addr, mut rx, cancel, handle) = spawn_server(16).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"this is not json\n").await.unwrap();
        stream
            .write_all(
                b"{\"timestamp\":\"t\",\"level\":\"WARN\",\"source\":\"after\",\"message\":\"m\"}\n",
            )
            .await
            .unwrap();

        // 잘못된 라인은 버려지고, 같은 연결의 다음 라인은 정상 처리됩니다.
        let raw = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.source, "after");

        drop(stream);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn empty_lines_are_skipped() {
        let (addr, mut rx, cancel, handle) = spawn_server(16).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"\n\n").await.unwrap();
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
        assert_eq!(raw.level, "INFO");

        drop(stream);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn oversized_line_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let small = TcpIngestSettings {
            max_connections: 4,
            max_line_bytes: 64,
        };
        let handle = tokio::spawn(serve(listener, tx, cancel.clone(), small));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        // 개행 없는 200바이트: 읽기 제한(64+1)에서 잘리고 연결이 닫혀야 합니다.
        stream.write_all(&[b'x'; 200]).await.unwrap();
        stream.write_all(b"\n").await.unwrap();

        // 서버가 닫으면 read는 0(EOF) 또는 리셋 에러를 반환합니다.
        let mut buf = [0u8; 16];
        let result = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .expect("server did not close oversized connection");
        match result {
            Ok(0) | Err(_) => {}
            Ok(n) => panic!("expected close, read {n} bytes"),
        }
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_processed() {
        let (addr, mut rx, cancel, handle) = spawn_server(16).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        // 개행 없이 쓰고 바로 닫습니다. 마지막 라인도 처리되어야 합니다.
        stream
            .write_all(
                b"{\"timestamp\":\"t\",\"level\":\"ERROR\",\"source\":\"eof\",\"message\":\"m\"}",
            )
            .await
            .unwrap();
        drop(stream);

        let raw = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.source, "eof");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn records_arrive_in_connection_order() {
        let (addr, mut rx, cancel, handle) = spawn_server(16).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        for i in 0..5 {
            let line = format!(
                "{{\"timestamp\":\"t{i}\",\"level\":\"INFO\",\"source\":\"s\",\"message\":\"m\"}}\n"
            );
            stream.write_all(line.as_bytes()).await.unwrap();
        }

        for i in 0..5 {
            let raw = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(raw.timestamp, format!("t{i}"));
        }

        drop(stream);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_ends_open_connections() {
        let (addr, _rx, cancel, handle) = spawn_server(16).await;

        // 피어가 닫지 않는 연결을 열어 둡니다.
        let _stream = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("tcp server did not stop after cancel")
            .unwrap();
    }
}
