use std::io;
use std::time::Duration;
use thiserror::Error;

/// ビルドリクエストの組み立てに失敗した理由
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("invalid image reference '{reference}': {reason}")]
    InvalidTag { reference: String, reason: String },

    #[error("build context is not a readable tar stream ({context}): {source}")]
    Context {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("target stage not found in Dockerfile: {0}")]
    UnknownTarget(String),
}

/// ストリームを返す前に発生するエンジン接続エラー
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to connect to engine at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out connecting to engine at {endpoint} after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("HTTP handshake with engine failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("failed to send build request: {0}")]
    Request(#[source] hyper::Error),

    #[error("invalid build request: {0}")]
    InvalidRequest(#[from] http::Error),

    #[error("engine rejected build request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("engine closed the connection before responding")]
    Closed,
}

/// ビルドストリームの途中で発生したエラー
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("build stream interrupted after {events} events: {source}")]
    Transport {
        events: usize,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Parse(#[from] dockpipe_core::ParseError),

    #[error(transparent)]
    Config(#[from] dockpipe_config::ConfigError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Build failed: {message}")]
    BuildFailed { message: String, code: Option<i64> },
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::Parse(e) => {
                format!(
                    "Dockerfileを解析できません: {}\n\
                     \n\
                     {}行目の命令を確認してください。",
                    e.reason, e.line
                )
            }
            BuildError::Assembly(AssemblyError::InvalidTag { reference, reason }) => {
                format!(
                    "イメージ名が不正です: {}\n\
                     理由: {}\n\
                     \n\
                     例: myapp:1.0, registry.example.com/team/app:latest",
                    reference, reason
                )
            }
            BuildError::Assembly(AssemblyError::UnknownTarget(target)) => {
                format!(
                    "ターゲットステージが見つかりません: {}\n\
                     \n\
                     Dockerfileの FROM ... AS <name> を確認してください。",
                    target
                )
            }
            BuildError::Connection(ConnectionError::Connect { endpoint, .. })
            | BuildError::Connection(ConnectionError::Timeout { endpoint, .. }) => {
                format!(
                    "ビルドエンジンに接続できません: {}\n\
                     \n\
                     解決方法:\n\
                     1. Dockerデーモンが起動しているか確認してください\n\
                     2. --host または DOCKER_HOST で接続先を指定してください",
                    endpoint
                )
            }
            BuildError::Connection(ConnectionError::Rejected { status, message }) => {
                format!(
                    "エンジンがビルドリクエストを拒否しました（HTTP {}）: {}",
                    status, message
                )
            }
            BuildError::Stream(e) => {
                format!(
                    "ビルド中にエンジンとの接続が切れました: {}\n\
                     \n\
                     ビルドの結果は不明です。再実行してください。",
                    e
                )
            }
            BuildError::BuildFailed { message, .. } => {
                format!(
                    "ビルドに失敗しました: {}\n\
                     \n\
                     Dockerfileの内容を確認してください。",
                    message
                )
            }
            _ => format!("{}", self),
        }
    }

    /// 同じ入力で再試行すれば成功しうるか
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BuildError::Connection(
                ConnectionError::Connect { .. }
                    | ConnectionError::Timeout { .. }
                    | ConnectionError::Closed
            ) | BuildError::Stream(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_for_parse_error() {
        let parse = dockpipe_core::parse("RUN true").unwrap_err();
        let err = BuildError::from(parse);
        let message = err.user_message();
        assert!(message.contains("Dockerfileを解析できません"));
        assert!(message.contains("1行目"));
    }

    #[test]
    fn test_user_message_for_build_failure() {
        let err = BuildError::BuildFailed {
            message: "no space left".to_string(),
            code: Some(1),
        };
        assert!(err.user_message().contains("no space left"));
        assert_eq!(err.to_string(), "Build failed: no space left");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_errors() {
        let timeout = BuildError::from(ConnectionError::Timeout {
            endpoint: "tcp://127.0.0.1:2375".to_string(),
            timeout: Duration::from_secs(1),
        });
        assert!(timeout.is_transient());

        let rejected = BuildError::from(ConnectionError::Rejected {
            status: 400,
            message: "bad".to_string(),
        });
        assert!(!rejected.is_transient());
        assert!(rejected.user_message().contains("HTTP 400"));
    }
}
