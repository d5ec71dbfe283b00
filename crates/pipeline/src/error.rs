//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for VigilError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 시작 시점 에러(바인드 실패, 출력 파일 열기 실패)만 치명적이며,
//! 레코드 단위 에러(디코딩, 직렬화)는 로깅 후 해당 레코드를 건너뜁니다.

use vigil_core::error::{PipelineError, VigilError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 리스너 바인드 실패 (치명적 시작 에러)
    #[error("bind error: {surface} listener on {addr}: {reason}")]
    Bind {
        /// 수신 표면 (http, tcp)
        surface: &'static str,
        /// 바인드 주소
        addr: String,
        /// 실패 사유
        reason: String,
    },

    /// 알림 출력 파일 열기 실패 (치명적 시작 에러)
    #[error("file open error: {path}: {reason}")]
    FileOpen {
        /// 출력 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 수집 표면 런타임 에러 (accept 실패 등)
    #[error("ingest error: {surface}: {reason}")]
    Ingest {
        /// 수신 표면 (http, tcp)
        surface: &'static str,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for VigilError {
    fn from(err: LogPipelineError) -> Self {
        VigilError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_display() {
        let err = LogPipelineError::Bind {
            surface: "http",
            addr: "0.0.0.0:8080".to_owned(),
            reason: "address already in use".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("http"));
        assert!(msg.contains("0.0.0.0:8080"));
        assert!(msg.contains("already in use"));
    }

    #[test]
    fn file_open_error_display() {
        let err = LogPipelineError::FileOpen {
            path: "/var/lib/vigil/alerts.json".to_owned(),
            reason: "permission denied".to_owned(),
        };
        assert!(err.to_string().contains("alerts.json"));
    }

    #[test]
    fn converts_to_vigil_error() {
        let err = LogPipelineError::Channel("receiver closed".to_owned());
        let core_err: VigilError = err.into();
        assert!(matches!(core_err, VigilError::Pipeline(_)));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: LogPipelineError = io.into();
        assert!(matches!(err, LogPipelineError::Io(_)));
    }
}
