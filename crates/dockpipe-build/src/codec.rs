use bytes::{Bytes, BytesMut};
use std::io;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder};

/// 1行として受け付ける最大バイト数
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// 改行で区切られた1フレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// 行末の `\n`（と直前の `\r`）を取り除いた生バイト。UTF-8の検証はしない。
    Complete(Bytes),
    /// 上限を超えた行。内容は次の改行まで読み捨てる。
    Oversized { limit: usize },
}

/// 改行区切りのフレーミング
#[derive(Debug)]
pub struct LineCodec {
    inner: AnyDelimiterCodec,
    max_length: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), max_length),
            max_length,
        }
    }

    fn frame(
        &self,
        result: Result<Option<Bytes>, AnyDelimiterCodecError>,
    ) -> io::Result<Option<Line>> {
        match result {
            Ok(Some(line)) => Ok(Some(Line::Complete(without_carriage_return(line)))),
            Ok(None) => Ok(None),
            Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => Ok(Some(Line::Oversized {
                limit: self.max_length,
            })),
            Err(AnyDelimiterCodecError::Io(e)) => Err(e),
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn without_carriage_return(line: Bytes) -> Bytes {
    match line.last() {
        Some(b'\r') => line.slice(..line.len() - 1),
        _ => line,
    }
}

impl Decoder for LineCodec {
    type Item = Line;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Line>> {
        let result = self.inner.decode(buf);
        self.frame(result)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Line>> {
        let result = self.inner.decode_eof(buf);
        self.frame(result)
    }
}
