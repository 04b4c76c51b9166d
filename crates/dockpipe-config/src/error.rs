use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("エンジンのエンドポイントが不正です: {endpoint} ({reason})")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error(
        "未対応のエンドポイントスキームです: {0}\n\
        unix://, tcp://, http:// のいずれかを指定してください"
    )]
    UnsupportedScheme(String),

    #[error("APIバージョンが不正です: {0}（例: 1.43）")]
    InvalidApiVersion(String),

    #[error("接続タイムアウトが不正です: {0}（秒数を指定してください）")]
    InvalidTimeout(String),

    #[error("設定ファイルを解析できません: {path}\n理由: {source}")]
    InvalidFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
