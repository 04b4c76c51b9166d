//! 物理行から論理行への変換

use crate::error::{ParseError, ParseErrorKind, Result};
use crate::model::Instruction;

/// 先頭で認識するパーサーディレクティブ
const DIRECTIVES: [&str; 3] = ["syntax", "escape", "check"];

/// 継続行を結合した1つの論理行
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogicalLine {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// ファイル先頭のディレクティブを読み取った結果
#[derive(Debug)]
pub(crate) struct Header {
    pub directives: Vec<Instruction>,
    pub escape: char,
    /// ヘッダーが消費した物理行数
    pub consumed: usize,
}

/// `# name=value` 形式ならディレクティブ名と値を返す
fn directive(line: &str) -> Option<(String, &str)> {
    let body = line.trim().strip_prefix('#')?;
    let (name, value) = body.split_once('=')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    let name = name.to_ascii_lowercase();
    DIRECTIVES
        .contains(&name.as_str())
        .then_some((name, value.trim()))
}

/// ヘッダー部のディレクティブを読む
///
/// 最初の命令・空行・通常のコメントでヘッダーは終わる。
pub(crate) fn read_header(lines: &[&str]) -> Result<Header> {
    let mut header = Header {
        directives: Vec::new(),
        escape: '\\',
        consumed: 0,
    };

    for (i, line) in lines.iter().enumerate() {
        let Some((name, value)) = directive(line) else {
            break;
        };
        let line_no = i + 1;

        let seen = header
            .directives
            .iter()
            .any(|d| d.arguments().first().is_some_and(|n| *n == name));
        if seen {
            return Err(ParseError::new(
                ParseErrorKind::DuplicateDirective(name),
                line_no,
            ));
        }

        if name == "escape" {
            header.escape = match value {
                "\\" => '\\',
                "`" => '`',
                _ => {
                    return Err(ParseError::new(
                        ParseErrorKind::InvalidDirective {
                            name,
                            value: value.to_string(),
                        },
                        line_no,
                    ));
                }
            };
        }

        header
            .directives
            .push(Instruction::directive(&name, value, line_no));
        header.consumed = line_no;
    }

    Ok(header)
}

/// 行末がエスケープ文字（後続の空白は許容）なら、それを取り除いた本体を返す
fn strip_continuation(line: &str, escape: char) -> Option<&str> {
    line.trim_end().strip_suffix(escape)
}

fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// 継続行を結合して論理行の列にする
///
/// `first_line` は `lines[0]` の物理行番号。継続中のコメント行・空行は捨てる。
/// 継続が終わらないままファイルが終わった場合も1つの論理行として扱う。
pub(crate) fn logical_lines(lines: &[&str], first_line: usize, escape: char) -> Vec<LogicalLine> {
    let mut out = Vec::new();
    let mut current: Option<LogicalLine> = None;

    for (offset, raw) in lines.iter().enumerate() {
        let line_no = first_line + offset;

        if is_comment_or_blank(raw) {
            continue;
        }

        let (body, continues) = match strip_continuation(raw, escape) {
            Some(body) => (body, true),
            None => (*raw, false),
        };

        let logical = current.get_or_insert_with(|| LogicalLine {
            text: String::new(),
            start: line_no,
            end: line_no,
        });
        logical.text.push_str(body);
        logical.end = line_no;

        if !continues {
            out.extend(current.take());
        }
    }

    out.extend(current);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_lines_join_continuations() {
        let src = ["RUN apt-get update && \\", "    apt-get install -y vim", "CMD x"];
        let lines = logical_lines(&src, 1, '\\');
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "RUN apt-get update &&     apt-get install -y vim");
        assert_eq!((lines[0].start, lines[0].end), (1, 2));
        assert_eq!((lines[1].start, lines[1].end), (3, 3));
    }

    #[test]
    fn test_logical_lines_skip_comments_inside_continuation() {
        let src = ["RUN a \\", "# note", "", "  b"];
        let lines = logical_lines(&src, 1, '\\');
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "RUN a   b");
        assert_eq!(lines[0].end, 4);
    }

    #[test]
    fn test_logical_lines_trailing_whitespace_after_escape() {
        let src = ["RUN a \\   ", "b"];
        let lines = logical_lines(&src, 1, '\\');
        assert_eq!(lines[0].text, "RUN a b");
    }

    #[test]
    fn test_logical_lines_unterminated_continuation() {
        let src = ["RUN a \\"];
        let lines = logical_lines(&src, 5, '\\');
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "RUN a ");
        assert_eq!(lines[0].start, 5);
    }

    #[test]
    fn test_logical_lines_backtick_escape() {
        let src = ["RUN dir c:\\ `", "  /b"];
        let lines = logical_lines(&src, 1, '`');
        assert_eq!(lines[0].text, "RUN dir c:\\   /b");
    }

    #[test]
    fn test_read_header() {
        let src = ["# syntax=docker/dockerfile:1", "#escape=`", "FROM x"];
        let header = read_header(&src).unwrap();
        assert_eq!(header.directives.len(), 2);
        assert_eq!(header.escape, '`');
        assert_eq!(header.consumed, 2);
    }

    #[test]
    fn test_read_header_stops_at_plain_comment() {
        let src = ["# hello", "# syntax=x", "FROM x"];
        let header = read_header(&src).unwrap();
        assert!(header.directives.is_empty());
        assert_eq!(header.consumed, 0);
    }

    #[test]
    fn test_read_header_rejects_bad_escape() {
        let err = read_header(&["# escape=x"]).unwrap_err();
        assert_eq!(err.line, 1);
        assert!(matches!(err.reason, ParseErrorKind::InvalidDirective { .. }));
    }

    #[test]
    fn test_read_header_rejects_duplicates() {
        let err = read_header(&["# syntax=a", "# SYNTAX=b"]).unwrap_err();
        assert_eq!(err.reason, ParseErrorKind::DuplicateDirective("syntax".to_string()));
        assert_eq!(err.line, 2);
    }
}
