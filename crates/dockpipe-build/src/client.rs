use crate::codec::{Line, LineCodec};
use crate::error::{ConnectionError, StreamError};
use crate::event::{ProgressEvent, decode_line};
use crate::request::BuildRequest;
use crate::transport;
use bytes::Bytes;
use dockpipe_config::EngineConfig;
use futures_util::Stream;
use futures_util::stream::FusedStream;
use http::Request;
use http::header::{CONTENT_TYPE, HOST};
use http_body_util::Full;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

/// ビルドエンジンのクライアント
///
/// 設定以外の状態を持たないため、複製して並行に使える。
#[derive(Debug, Clone)]
pub struct BuildClient {
    config: EngineConfig,
}

impl BuildClient {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// ビルドリクエストを送信し、進捗イベントのストリームを返す
    ///
    /// 接続・ハンドシェイクの失敗や2xx以外の応答はストリームを返す前にエラーになる。
    pub async fn submit(&self, request: BuildRequest) -> Result<BuildEventStream, ConnectionError> {
        let uri = format!(
            "{}?{}",
            self.config.api_path("/build"),
            request.query_string()
        );
        let tag = request.tag().to_string();
        let context = request.into_context();

        tracing::info!(
            "Building image: {} ({} bytes context, engine {})",
            tag,
            context.len(),
            self.config.endpoint
        );
        tracing::debug!("Build request: POST {}", uri);

        let http_request = Request::post(uri)
            .header(HOST, self.config.endpoint.host_header())
            .header(CONTENT_TYPE, "application/x-tar")
            .body(Full::new(context))?;

        let (status, body) = transport::send(&self.config, http_request).await?;
        if !status.is_success() {
            let message = body.error_message(status).await;
            tracing::debug!("Build request rejected: {} {}", status, message);
            return Err(ConnectionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(BuildEventStream::from_reader(StreamReader::new(body)))
    }
}

/// ビルドストリームの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// イベントを受信中
    Streaming,
    /// エンジンが最後の行の後に接続を閉じた
    Completed,
    /// `ErrorDetail` を受信した
    Failed,
    /// 転送中に接続が切れた
    Interrupted,
    /// 呼び出し側が途中で読むのをやめた
    Abandoned,
}

type Lines = FramedRead<Pin<Box<dyn AsyncRead + Send>>, LineCodec>;

/// 進捗イベントの遅延ストリーム
///
/// 読み進めた分だけエンジンから受信する。終了（正常・`ErrorDetail`・転送エラー）または
/// 破棄の時点で接続を解放する。
pub struct BuildEventStream {
    lines: Option<Lines>,
    state: StreamState,
    events: usize,
}

impl BuildEventStream {
    /// 任意の改行区切りJSONの読み込み元からストリームを作る
    ///
    /// 保存済みのビルドログの再生などに使う。
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        let reader: Pin<Box<dyn AsyncRead + Send>> = Box::pin(reader);
        Self {
            lines: Some(FramedRead::new(reader, LineCodec::new())),
            state: StreamState::Streaming,
            events: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// 接続が解放済みか
    pub fn is_released(&self) -> bool {
        self.lines.is_none()
    }

    /// これまでに返したイベント数
    pub fn events_seen(&self) -> usize {
        self.events
    }

    /// 残りを読まずに接続を閉じる
    pub fn close(&mut self) {
        if self.lines.is_some() {
            self.release(StreamState::Abandoned);
        }
    }

    fn release(&mut self, state: StreamState) {
        self.lines = None;
        self.state = state;
        tracing::debug!(
            "Build stream released: {:?} after {} events",
            state,
            self.events
        );
    }
}

impl Stream for BuildEventStream {
    type Item = Result<ProgressEvent, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let Some(lines) = this.lines.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(Pin::new(lines).poll_next(cx)) {
                Some(Ok(Line::Oversized { limit })) => {
                    tracing::warn!("Skipping build output line longer than {} bytes", limit);
                    this.events += 1;
                    return Poll::Ready(Some(Ok(ProgressEvent::Aux {
                        raw: Bytes::new(),
                        malformed: true,
                    })));
                }
                Some(Ok(Line::Complete(line))) => {
                    let Some(event) = decode_line(&line) else {
                        continue;
                    };
                    this.events += 1;
                    if let ProgressEvent::ErrorDetail { message, .. } = &event {
                        tracing::debug!("Build reported error: {}", message);
                        this.release(StreamState::Failed);
                    }
                    return Poll::Ready(Some(Ok(event)));
                }
                Some(Err(source)) => {
                    let events = this.events;
                    this.release(StreamState::Interrupted);
                    return Poll::Ready(Some(Err(StreamError::Transport { events, source })));
                }
                None => {
                    this.release(StreamState::Completed);
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl FusedStream for BuildEventStream {
    fn is_terminated(&self) -> bool {
        self.lines.is_none()
    }
}

impl Drop for BuildEventStream {
    fn drop(&mut self) {
        if self.lines.is_some() {
            self.release(StreamState::Abandoned);
        }
    }
}

impl fmt::Debug for BuildEventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildEventStream")
            .field("state", &self.state)
            .field("events", &self.events)
            .finish()
    }
}
