//! ビルド進捗イベントのデコード
//!
//! エンジンは改行区切りのJSONオブジェクトを返す。1行を1つの [`ProgressEvent`] に変換し、
//! 解釈できない行も失わずに `Aux` として残す。

use bollard::models::BuildInfo;
use bytes::Bytes;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// エンジンから届いた1行分の進捗
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEvent {
    /// ビルドステップの出力（改行を含むことがある）
    Stream(String),

    /// pull等のステータス
    Status {
        id: Option<String>,
        status: String,
        progress: Option<String>,
    },

    /// ビルド失敗。この後にイベントは届かない
    ErrorDetail { message: String, code: Option<i64> },

    /// 上記以外の行。JSONとして読めない場合は `malformed`
    Aux {
        #[serde(serialize_with = "serialize_lossy")]
        raw: Bytes,
        malformed: bool,
    },
}

impl ProgressEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, ProgressEvent::ErrorDetail { .. })
    }

    /// `Aux` の生JSON（malformedなら None）
    pub fn json(&self) -> Option<Value> {
        match self {
            ProgressEvent::Aux {
                raw,
                malformed: false,
            } => serde_json::from_slice(raw).ok(),
            _ => None,
        }
    }

    /// ビルド完了時の `{"aux":{"ID":"sha256:..."}}` からイメージIDを取り出す
    pub fn image_id(&self) -> Option<String> {
        self.json()?
            .get("aux")?
            .get("ID")?
            .as_str()
            .map(str::to_string)
    }
}

fn serialize_lossy<S: Serializer>(raw: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(raw))
}

/// 1行をデコード
///
/// 空行（空白のみ）は None。それ以外は必ずイベントになり、パニックもエラーも起こさない。
pub fn decode_line(line: &[u8]) -> Option<ProgressEvent> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    let malformed = || ProgressEvent::Aux {
        raw: Bytes::copy_from_slice(line),
        malformed: true,
    };

    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(_) => return Some(malformed()),
    };
    if !value.is_object() {
        return Some(malformed());
    }

    let info: Option<BuildInfo> = serde_json::from_value(value.clone()).ok();

    if let Some(event) = error_event(info.as_ref(), &value) {
        return Some(event);
    }

    if let Some(info) = info {
        if let Some(text) = info.stream {
            return Some(ProgressEvent::Stream(text));
        }
        if let Some(status) = info.status {
            return Some(ProgressEvent::Status {
                id: info.id,
                status,
                progress: info.progress,
            });
        }
    }

    Some(ProgressEvent::Aux {
        raw: Bytes::copy_from_slice(line),
        malformed: false,
    })
}

/// `errorDetail` / `error` を含む行をエラーイベントにする
fn error_event(info: Option<&BuildInfo>, value: &Value) -> Option<ProgressEvent> {
    if let Some(info) = info {
        if let Some(detail) = &info.error_detail {
            let message = detail
                .message
                .clone()
                .or_else(|| info.error.clone())
                .unwrap_or_else(|| "Unknown build error".to_string());
            return Some(ProgressEvent::ErrorDetail {
                message,
                code: detail.code,
            });
        }
        if let Some(error) = &info.error {
            return Some(ProgressEvent::ErrorDetail {
                message: error.clone(),
                code: None,
            });
        }
    }

    // 型が合わずモデルに載らなかった場合でもエラーは落とさない
    let detail = value.get("errorDetail").filter(|v| !v.is_null());
    let error = value.get("error").filter(|v| !v.is_null());
    if detail.is_none() && error.is_none() {
        return None;
    }
    let message = detail
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .or_else(|| error.and_then(Value::as_str))
        .map(str::to_string)
        .or_else(|| detail.or(error).map(Value::to_string))
        .unwrap_or_default();
    let code = detail.and_then(|d| d.get("code")).and_then(Value::as_i64);
    Some(ProgressEvent::ErrorDetail { message, code })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_stream() {
        let event = decode_line(br#"{"stream":"Step 1/3 : FROM ubuntu\n"}"#).unwrap();
        assert_eq!(event, ProgressEvent::Stream("Step 1/3 : FROM ubuntu\n".to_string()));
    }

    #[test]
    fn test_decode_error_detail() {
        let event = decode_line(br#"{"errorDetail":{"message":"no space left","code":1},"error":"no space left"}"#)
            .unwrap();
        assert_eq!(
            event,
            ProgressEvent::ErrorDetail {
                message: "no space left".to_string(),
                code: Some(1)
            }
        );
        assert!(event.is_error());

        let event = decode_line(br#"{"error":"failed to solve"}"#).unwrap();
        assert_eq!(
            event,
            ProgressEvent::ErrorDetail {
                message: "failed to solve".to_string(),
                code: None
            }
        );
    }

    #[test]
    fn test_decode_error_with_unexpected_types() {
        let event = decode_line(br#"{"errorDetail":{"message":"boom","code":"E1"}}"#).unwrap();
        assert_eq!(
            event,
            ProgressEvent::ErrorDetail {
                message: "boom".to_string(),
                code: None
            }
        );

        let event = decode_line(br#"{"error":{"reason":"x"}}"#).unwrap();
        assert!(matches!(event, ProgressEvent::ErrorDetail { message, .. } if message.contains("reason")));
    }

    #[test]
    fn test_decode_status() {
        let event = decode_line(
            br#"{"status":"Downloading","progressDetail":{"current":1,"total":2},"progress":"[=>  ]","id":"a1b2"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ProgressEvent::Status {
                id: Some("a1b2".to_string()),
                status: "Downloading".to_string(),
                progress: Some("[=>  ]".to_string()),
            }
        );
    }

    #[test]
    fn test_decode_aux() {
        let line = br#"{"aux":{"ID":"sha256:abc123"}}"#;
        let event = decode_line(line).unwrap();
        assert!(matches!(event, ProgressEvent::Aux { malformed: false, .. }));
        assert_eq!(event.image_id().as_deref(), Some("sha256:abc123"));

        let other = decode_line(br#"{"something":"else"}"#).unwrap();
        assert!(matches!(other, ProgressEvent::Aux { malformed: false, .. }));
        assert_eq!(other.image_id(), None);
    }

    #[test]
    fn test_decode_blank_lines() {
        assert_eq!(decode_line(b""), None);
        assert_eq!(decode_line(b"  \t\r"), None);
    }

    #[test]
    fn test_decode_never_fails() {
        let inputs: [&[u8]; 8] = [
            b"not json",
            b"{\"stream\":",
            b"[1,2,3]",
            b"\"just a string\"",
            b"42",
            b"null",
            &[0xff, 0xfe, 0x00, 0x7b],
            b"{\"stream\": 12}",
        ];
        for input in inputs {
            let event = decode_line(input).expect("non-blank input yields an event");
            match event {
                ProgressEvent::Aux { raw, malformed } => {
                    assert_eq!(&raw[..], input);
                    // 型違いの stream はJSONとしては正しい
                    assert_eq!(malformed, input != b"{\"stream\": 12}");
                }
                other => panic!("unexpected event for {:?}: {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_serialize_event() {
        let json = serde_json::to_value(ProgressEvent::Stream("hi\n".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"stream": "hi\n"}));

        let json = serde_json::to_value(ProgressEvent::Aux {
            raw: Bytes::from_static(b"oops"),
            malformed: true,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"aux": {"raw": "oops", "malformed": true}}));
    }
}
