//! 引数の分割

/// 先頭の単語と残りに分割
pub(crate) fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

/// クォートとエスケープを考慮して空白で分割する
///
/// クォート文字やエスケープ文字は取り除かずにそのまま残すため、
/// 単語を空白1つで連結すれば同じ単語列に戻る。
pub(crate) fn split_words(s: &str, escape: char) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == escape && quote != Some('\'') {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
            continue;
        }

        match quote {
            Some(q) if c == q => {
                quote = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                current.push(c);
            }
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// JSON配列（文字列のみ）として解釈できれば要素を返す
pub(crate) fn exec_array(s: &str) -> Option<Vec<String>> {
    if !s.starts_with('[') {
        return None;
    }
    serde_json::from_str::<Vec<String>>(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_first_word() {
        assert_eq!(split_first_word("  RUN   echo hi "), ("RUN", "echo hi"));
        assert_eq!(split_first_word("FROM"), ("FROM", ""));
    }

    #[test]
    fn test_split_words_keeps_quotes() {
        let words = split_words(r#"description="hello   world" version=1"#, '\\');
        assert_eq!(words, vec![r#"description="hello   world""#, "version=1"]);
    }

    #[test]
    fn test_split_words_escaped_space() {
        let words = split_words(r"A=x\ y B=z", '\\');
        assert_eq!(words, vec![r"A=x\ y", "B=z"]);
    }

    #[test]
    fn test_split_words_single_quotes_are_literal() {
        let words = split_words(r"'a\' b", '\\');
        assert_eq!(words, vec![r"'a\'", "b"]);
    }

    #[test]
    fn test_split_words_unbalanced_quote() {
        let words = split_words(r#"A="x y"#, '\\');
        assert_eq!(words, vec![r#"A="x y"#]);
    }

    #[test]
    fn test_exec_array() {
        assert_eq!(
            exec_array(r#"["a", "b"]"#),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(exec_array("[]"), Some(vec![]));
        assert_eq!(exec_array("[not json"), None);
        assert_eq!(exec_array(r#"["a", 1]"#), None);
        assert_eq!(exec_array("echo [x]"), None);
    }
}
