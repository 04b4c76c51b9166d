pub mod endpoint;
pub mod error;

pub use endpoint::*;
pub use error::*;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 既定の接続タイムアウト
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// ビルドエンジンへの接続設定
///
/// プロセス全体の暗黙の状態は持たず、この値をクライアントに渡して使う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub endpoint: Endpoint,
    /// `1.43` のようなEngine APIバージョン（None ならバージョンなしのパス）
    pub api_version: Option<String>,
    pub connect_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(Endpoint::default())
    }
}

/// 設定ファイル（config.json）の構造
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    host: Option<String>,
    api_version: Option<String>,
    connect_timeout_secs: Option<u64>,
}

impl EngineConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            api_version: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_api_version(mut self, version: &str) -> Result<Self> {
        self.api_version = Some(normalize_api_version(version)?);
        Ok(self)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// APIパスにバージョンを付与（例: `/build` -> `/v1.43/build`）
    pub fn api_path(&self, path: &str) -> String {
        match &self.api_version {
            Some(version) => format!("/v{}{}", version, path),
            None => path.to_string(),
        }
    }

    /// 接続設定を解決
    ///
    /// 以下の優先順位でエンドポイントを決定:
    /// 1. 引数 `host_override`（CLI の --host）
    /// 2. 環境変数 DOCKPIPE_HOST, DOCKER_HOST
    /// 3. 設定ファイルの `host`
    /// 4. unix:///var/run/docker.sock
    ///
    /// APIバージョンは DOCKER_API_VERSION、タイムアウトは DOCKPIPE_CONNECT_TIMEOUT（秒）が
    /// 設定ファイルより優先される。
    pub fn load(host_override: Option<&str>) -> Result<Self> {
        let file = match config_file_path() {
            Some(path) => read_config_file(&path)?.unwrap_or_default(),
            None => ConfigFile::default(),
        };

        let host = host_override
            .map(str::to_string)
            .or_else(|| env_var("DOCKPIPE_HOST"))
            .or_else(|| env_var("DOCKER_HOST"))
            .or(file.host);
        let endpoint = match host {
            Some(host) => host.parse()?,
            None => Endpoint::default(),
        };

        let api_version = env_var("DOCKER_API_VERSION")
            .or(file.api_version)
            .map(|v| normalize_api_version(&v))
            .transpose()?;

        let connect_timeout = match env_var("DOCKPIPE_CONNECT_TIMEOUT") {
            Some(secs) => secs
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidTimeout(secs.clone()))?,
            None => file
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        };

        let config = Self {
            endpoint,
            api_version,
            connect_timeout,
        };
        tracing::debug!(
            endpoint = %config.endpoint,
            api_version = ?config.api_version,
            "Resolved engine configuration"
        );
        Ok(config)
    }
}

/// 設定ファイルのパス
///
/// DOCKPIPE_CONFIG_PATH が優先され、なければ ~/.config/dockpipe/config.json
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = env_var("DOCKPIPE_CONFIG_PATH") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("dockpipe").join("config.json"))
}

fn read_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let file = serde_json::from_str(&content).map_err(|source| ConfigError::InvalidFile {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Loaded config file: {}", path.display());
    Ok(Some(file))
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `v1.43` / `1.43` を `1.43` に正規化
fn normalize_api_version(version: &str) -> Result<String> {
    let trimmed = version.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let valid = bare
        .split_once('.')
        .is_some_and(|(major, minor)| {
            !major.is_empty()
                && !minor.is_empty()
                && major.chars().all(|c| c.is_ascii_digit())
                && minor.chars().all(|c| c.is_ascii_digit())
        });
    if valid {
        Ok(bare.to_string())
    } else {
        Err(ConfigError::InvalidApiVersion(version.to_string()))
    }
}
