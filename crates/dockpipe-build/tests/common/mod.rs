use dockpipe_config::{Endpoint, EngineConfig};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// 偽エンジンが受け取ったリクエスト
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// 1接続だけ受け付け、スクリプトどおりに応答する偽エンジン
pub struct FakeEngine {
    pub config: EngineConfig,
    handle: JoinHandle<CapturedRequest>,
}

impl FakeEngine {
    pub async fn start<F, Fut>(script: F) -> Self
    where
        F: FnOnce(TcpStream) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            script(socket).await;
            request
        });

        let config = EngineConfig::new(Endpoint::Tcp {
            host: "127.0.0.1".to_string(),
            port,
        });
        Self { config, handle }
    }

    /// スクリプトの終了を待ち、受け取ったリクエストを返す
    pub async fn finish(self) -> CapturedRequest {
        tokio::time::timeout(TIMEOUT, self.handle)
            .await
            .expect("fake engine script did not finish")
            .unwrap()
    }
}

pub async fn read_request<S: AsyncRead + Unpin>(socket: &mut S) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending request headers");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(buf[..header_end].to_vec()).unwrap();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap().split(' ');
    let method = request_line.next().unwrap().to_string();
    let path = request_line.next().unwrap().to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .map(|v| v.parse().unwrap())
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending the whole body");
        body.extend_from_slice(&chunk[..n]);
    }

    CapturedRequest {
        method,
        path,
        headers,
        body,
    }
}

pub async fn write_chunked_head<S: AsyncWrite + Unpin>(socket: &mut S) {
    socket
        .write_all(
            b"HTTP/1.1 200 OK\r\n\
              Content-Type: application/json\r\n\
              Transfer-Encoding: chunked\r\n\r\n",
        )
        .await
        .unwrap();
    socket.flush().await.unwrap();
}

pub async fn write_chunk<S: AsyncWrite + Unpin>(socket: &mut S, data: &str) {
    let frame = format!("{:x}\r\n{}\r\n", data.len(), data);
    socket.write_all(frame.as_bytes()).await.unwrap();
    socket.flush().await.unwrap();
}

pub async fn write_last_chunk<S: AsyncWrite + Unpin>(socket: &mut S) {
    socket.write_all(b"0\r\n\r\n").await.unwrap();
    socket.flush().await.unwrap();
}

/// クライアントが接続を閉じるまで待つ
pub async fn wait_for_close<S: AsyncRead + Unpin>(socket: &mut S) {
    let mut buf = [0u8; 1024];
    loop {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}
