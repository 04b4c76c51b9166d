//! エンジンのエンドポイント

use crate::error::{ConfigError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Docker Engine の既定ソケット
pub const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// 平文TCPの既定ポート
pub const DEFAULT_TCP_PORT: u16 = 2375;

/// ビルドエンジンへの接続先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Unix(PathBuf::from(DEFAULT_SOCKET))
    }
}

impl Endpoint {
    /// HTTPリクエストの `Host` ヘッダー値
    pub fn host_header(&self) -> String {
        match self {
            // ソケット接続ではホスト名に意味がないため固定値
            Endpoint::Unix(_) => "localhost".to_string(),
            Endpoint::Tcp { host, port } => format!("{}:{}", host, port),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
        }
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    /// `unix:///path`, `/path`, `tcp://host[:port]`, `http://host[:port]` を受け付ける
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = |reason: &str| ConfigError::InvalidEndpoint {
            endpoint: s.to_string(),
            reason: reason.to_string(),
        };

        if s.starts_with('/') {
            return Ok(Endpoint::Unix(PathBuf::from(s)));
        }

        let Some((scheme, rest)) = s.split_once("://") else {
            return Err(invalid("scheme is missing"));
        };

        match scheme.to_ascii_lowercase().as_str() {
            "unix" => {
                if rest.is_empty() {
                    return Err(invalid("socket path is empty"));
                }
                Ok(Endpoint::Unix(PathBuf::from(rest)))
            }
            "tcp" | "http" => {
                let authority = rest.split('/').next().unwrap_or_default();
                let (host, port) = split_host_port(authority).ok_or_else(|| invalid("bad host:port"))?;
                Ok(Endpoint::Tcp { host, port })
            }
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }
}

fn split_host_port(authority: &str) -> Option<(String, u16)> {
    if authority.is_empty() {
        return None;
    }

    // [::1]:2375 形式のIPv6
    if let Some(inner) = authority.strip_prefix('[') {
        let (host, after) = inner.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None if after.is_empty() => DEFAULT_TCP_PORT,
            None => return None,
        };
        return Some((format!("[{}]", host), port));
    }

    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => Some((host.to_string(), port.parse().ok()?)),
        Some(_) => None,
        None => Some((authority.to_string(), DEFAULT_TCP_PORT)),
    }
}
