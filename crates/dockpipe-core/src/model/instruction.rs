//! 命令定義

use super::Keyword;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 引数の記述形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentForm {
    /// JSON配列形式: `CMD ["a", "b"]`
    Exec,
    /// シェル形式: 引数全体を1つの文字列として保持
    Shell,
    /// 空白区切りの単語列（クォートはそのまま保持）
    Words,
}

/// 命令が占める物理行の範囲（1始まり、両端を含む）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// 1つのDockerfile命令
///
/// パース後は変更されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    keyword: Keyword,
    arguments: Vec<String>,
    form: ArgumentForm,
    lines: LineRange,
}

impl Instruction {
    pub fn new(
        keyword: Keyword,
        arguments: Vec<String>,
        form: ArgumentForm,
        lines: LineRange,
    ) -> Self {
        Self {
            keyword,
            arguments,
            form,
            lines,
        }
    }

    /// パーサーディレクティブ（`# name=value`）を作成
    pub fn directive(name: &str, value: &str, line: usize) -> Self {
        Self {
            keyword: Keyword::Directive,
            arguments: vec![name.to_string(), value.to_string()],
            form: ArgumentForm::Words,
            lines: LineRange::new(line, line),
        }
    }

    pub fn keyword(&self) -> Keyword {
        self.keyword
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn form(&self) -> ArgumentForm {
        self.form
    }

    pub fn lines(&self) -> LineRange {
        self.lines
    }

    pub fn is_directive(&self) -> bool {
        self.keyword == Keyword::Directive
    }

    /// FROMのベースイメージ（`--platform` などのフラグは除く）
    pub fn base_image(&self) -> Option<&str> {
        if self.keyword != Keyword::From {
            return None;
        }
        self.arguments
            .iter()
            .find(|a| !a.starts_with("--"))
            .map(String::as_str)
    }

    /// `FROM image AS name` のステージ名
    pub fn stage_name(&self) -> Option<&str> {
        if self.keyword != Keyword::From {
            return None;
        }
        match self.arguments.iter().position(|a| a.eq_ignore_ascii_case("AS")) {
            Some(pos) => self.arguments.get(pos + 1).map(String::as_str),
            None => None,
        }
    }

    /// ARGで宣言される変数名（デフォルト値は除く）
    pub fn declared_args(&self) -> impl Iterator<Item = &str> {
        let args: &[String] = if self.keyword == Keyword::Arg {
            &self.arguments
        } else {
            &[]
        };
        args.iter()
            .map(|a| a.split_once('=').map(|(name, _)| name).unwrap_or(a.as_str()))
    }

    /// 正規化されたDockerfileの1行として書き出す
    pub fn render(&self) -> String {
        match (self.keyword, self.form) {
            (Keyword::Directive, _) => {
                let name = self.arguments.first().map(String::as_str).unwrap_or("");
                let value = self.arguments.get(1).map(String::as_str).unwrap_or("");
                format!("# {}={}", name, value)
            }
            (keyword, ArgumentForm::Exec) => {
                let array = serde_json::Value::from(self.arguments.clone());
                format!("{} {}", keyword, array)
            }
            (keyword, ArgumentForm::Shell | ArgumentForm::Words) => {
                format!("{} {}", keyword, self.arguments.join(" "))
            }
        }
    }

    /// 行番号を無視して構造が一致するか
    pub fn same_shape(&self, other: &Instruction) -> bool {
        self.keyword == other.keyword
            && self.form == other.form
            && self.arguments == other.arguments
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
