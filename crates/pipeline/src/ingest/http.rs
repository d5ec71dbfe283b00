//! HTTP 수집 표면 -- POST /logs
//!
//! 단일 라우트만 존재합니다. 본문은 [`RawLog`] JSON 오브젝트 하나이며,
//! 상태 코드 계약은 다음과 같습니다:
//! - 200: 큐 적재 성공 (`Log received`)
//! - 400: JSON 디코딩 실패
//! - 405: POST 외 메서드
//! - 404: 그 외 경로
//! - 503: 적재 전에 종료 신호 관측

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use vigil_core::types::RawLog;

/// HTTP 핸들러가 공유하는 상태
#[derive(Clone)]
pub struct HttpState {
    /// Q1 송신측
    pub tx: mpsc::Sender<RawLog>,
    /// 전역 종료 토큰
    pub cancel: CancellationToken,
}

/// `/logs` 단일 라우트 라우터를 생성합니다.
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/logs", post(receive_log))
        .with_state(state)
}

/// 바인드된 리스너 위에서 HTTP 서버를 실행합니다.
///
/// 종료 토큰이 취소되면 새 연결 수락을 멈추고
/// 진행 중인 요청이 끝나기를 기다린 뒤 반환합니다.
pub async fn serve(listener: TcpListener, state: HttpState) {
    let cancel = state.cancel.clone();
    let app = router(state);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
    {
        error!(error = %e, "http server error");
    }
    debug!("http server stopped");
}

/// POST /logs 핸들러
///
/// 본문을 직접 디코딩하여 상태 코드 계약(400)을 정확히 지키고,
/// Q1 적재는 종료 신호와의 select로 수행합니다 (503).
async fn receive_log(State(state): State<HttpState>, body: Bytes) -> Response {
    let raw: RawLog = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "rejected http log: invalid json");
            return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
        }
    };

    tokio::select! {
        biased;
        result = state.tx.send(raw) => match result {
            Ok(()) => (StatusCode::OK, "Log received").into_response(),
            Err(_) => {
                debug!("rejected http log: ingest queue closed");
                (StatusCode::SERVICE_UNAVAILABLE, "Service shutting down").into_response()
            }
        },
        () = state.cancel.cancelled() => {
            debug!("rejected http log: shutdown in progress");
            (StatusCode::SERVICE_UNAVAILABLE, "Service shutting down").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(capacity: usize) -> (HttpState, mpsc::Receiver<RawLog>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            HttpState {
                tx,
                cancel: CancellationToken::new(),
            },
            rx,
        )
    }

    fn log_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/logs")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn valid_log_is_enqueued_with_200() {
        let (state, mut rx) = state(4);
        let app = router(state);

        let response = app
            .oneshot(log_request(
                r#"{"timestamp":"t","level":"ERROR","source":"api","message":"m"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let raw = rx.recv().await.unwrap();
        assert_eq!(raw.level, "ERROR");
        assert_eq!(raw.source, "api");
    }

    #[tokio::test]
    async fn malformed_json_returns_400() {
        let (state, mut rx) = state(4);
        let app = router(state);

        let response = app.oneshot(log_request("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn wrong_method_returns_405() {
        let (state, _rx) = state(4);
        let app = router(state);

        let request = Request::builder()
            .method("GET")
            .uri("/logs")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn unknown_path_returns_404() {
        let (state, _rx) = state(4);
        let app = router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn shutdown_before_enqueue_returns_503() {
        // 용량 1 큐를 미리 채워 send를 블록시킨 상태에서 종료를 알립니다.
        let (tx, _rx) = mpsc::channel(1);
        tx.send(RawLog {
            timestamp: "t".to_owned(),
            level: "INFO".to_owned(),
            source: "s".to_owned(),
            message: "m".to_owned(),
        })
        .await
        .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let app = router(HttpState { tx, cancel });
        let response = app
            .oneshot(log_request(
                r#"{"timestamp":"t","level":"INFO","source":"s","message":"m"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
