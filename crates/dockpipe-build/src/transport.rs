//! エンジンとのHTTP/1.1接続（unixソケット / TCP）
//!
//! 接続タスクは起動せず、レスポンスボディを読む側が接続もポーリングする。
//! ボディを破棄すると接続も閉じる。

use crate::error::ConnectionError;
use bytes::Bytes;
use dockpipe_config::{Endpoint, EngineConfig};
use futures_util::Stream;
use futures_util::StreamExt;
use http::{Request, StatusCode};
use http_body_util::Full;
use hyper::body::{Body, Incoming};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// エラーレスポンスとして読み込む最大サイズ
const MAX_ERROR_BODY: usize = 64 * 1024;

pub(crate) trait EngineIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> EngineIo for T {}

type Connection = http1::Connection<TokioIo<Box<dyn EngineIo>>, Full<Bytes>>;

async fn open_stream(endpoint: &Endpoint) -> io::Result<Box<dyn EngineIo>> {
    match endpoint {
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            let stream = tokio::net::UnixStream::connect(path).await?;
            Ok(Box::new(stream))
        }
        #[cfg(not(unix))]
        Endpoint::Unix(_) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not supported on this platform",
        )),
        Endpoint::Tcp { host, port } => {
            // [::1] -> ::1
            let host = host.trim_start_matches('[').trim_end_matches(']');
            let stream = TcpStream::connect((host, *port)).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
    }
}

async fn connect(config: &EngineConfig) -> Result<Box<dyn EngineIo>, ConnectionError> {
    tracing::debug!("Connecting to engine: {}", config.endpoint);
    within_connect_timeout(config, open_stream(&config.endpoint)).await
}

async fn within_connect_timeout<F>(
    config: &EngineConfig,
    opening: F,
) -> Result<Box<dyn EngineIo>, ConnectionError>
where
    F: Future<Output = io::Result<Box<dyn EngineIo>>>,
{
    let endpoint = config.endpoint.to_string();
    match tokio::time::timeout(config.connect_timeout, opening).await {
        Ok(Ok(io)) => Ok(io),
        Ok(Err(source)) => Err(ConnectionError::Connect { endpoint, source }),
        Err(_) => Err(ConnectionError::Timeout {
            endpoint,
            timeout: config.connect_timeout,
        }),
    }
}

/// リクエストを送信し、レスポンスヘッダーまで待つ
pub(crate) async fn send(
    config: &EngineConfig,
    request: Request<Full<Bytes>>,
) -> Result<(StatusCode, ResponseBody), ConnectionError> {
    let io = connect(config).await?;
    let (mut sender, connection) = http1::handshake(TokioIo::new(io))
        .await
        .map_err(ConnectionError::Handshake)?;
    let mut connection: Pin<Box<Connection>> = Box::pin(connection);

    // ヘッダーが届くまでは送信と接続を並行して進める
    let (response, connection) = {
        let pending = sender.send_request(request);
        tokio::pin!(pending);

        let first = tokio::select! {
            biased;
            response = &mut pending => Progress::Responded(response),
            finished = connection.as_mut() => Progress::Finished(finished),
        };
        match first {
            Progress::Responded(response) => (response, Some(connection)),
            // 短いレスポンスは接続の終了と同時に読み切られている
            Progress::Finished(finished) => {
                tracing::debug!("Engine connection finished before response was taken");
                match (pending.await, finished) {
                    (Ok(response), _) => (Ok(response), None),
                    (Err(_), Err(e)) => return Err(ConnectionError::Request(e)),
                    (Err(e), Ok(())) => (Err(e), None),
                }
            }
        }
    };
    let response = response.map_err(|e| {
        if e.is_canceled() || e.is_closed() || e.is_incomplete_message() {
            ConnectionError::Closed
        } else {
            ConnectionError::Request(e)
        }
    })?;
    // 1リクエストのみ。ボディ終了後に接続が完了する
    drop(sender);

    let status = response.status();
    tracing::debug!("Engine responded: {}", status);
    Ok((
        status,
        ResponseBody {
            connection,
            body: response.into_body(),
        },
    ))
}

enum Progress {
    Responded(Result<http::Response<Incoming>, hyper::Error>),
    Finished(Result<(), hyper::Error>),
}

/// レスポンスボディのバイト列
///
/// ポーリングのたびに接続も進める。
pub(crate) struct ResponseBody {
    connection: Option<Pin<Box<Connection>>>,
    body: Incoming,
}

impl Stream for ResponseBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(connection) = this.connection.as_mut() {
            if let Poll::Ready(result) = connection.as_mut().poll(cx) {
                this.connection = None;
                match result {
                    Ok(()) => tracing::debug!("Engine connection finished"),
                    Err(e) => tracing::debug!("Engine connection ended with error: {}", e),
                }
            }
        }

        loop {
            match ready!(Pin::new(&mut this.body).poll_frame(cx)) {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        if !data.is_empty() {
                            return Poll::Ready(Some(Ok(data)));
                        }
                    }
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(io::Error::other(e)))),
                None => return Poll::Ready(None),
            }
        }
    }
}

impl ResponseBody {
    /// エラーレスポンスの `{"message": ...}` を取り出す
    pub(crate) async fn error_message(mut self, status: StatusCode) -> String {
        let mut buf = Vec::new();
        while let Some(chunk) = self.next().await {
            match chunk {
                Ok(chunk) => {
                    buf.extend_from_slice(&chunk);
                    if buf.len() >= MAX_ERROR_BODY {
                        buf.truncate(MAX_ERROR_BODY);
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Failed to read error response: {}", e);
                    break;
                }
            }
        }

        let message = serde_json::from_slice::<serde_json::Value>(&buf)
            .ok()
            .and_then(|v| v.get("message")?.as_str().map(str::to_string))
            .unwrap_or_else(|| String::from_utf8_lossy(&buf).trim().to_string());
        if message.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            message
        }
    }
}
