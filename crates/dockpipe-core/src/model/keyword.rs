//! 命令キーワード定義

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dockerfileの命令キーワード
///
/// `Directive` はファイル先頭のパーサーディレクティブ（`# syntax=...` など）を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Keyword {
    Directive,
    From,
    Run,
    Cmd,
    Label,
    Maintainer,
    Expose,
    Env,
    Add,
    Copy,
    Entrypoint,
    Volume,
    User,
    Workdir,
    Arg,
    Onbuild,
    Stopsignal,
    Healthcheck,
    Shell,
}

impl Keyword {
    /// 命令として書けるキーワード（ディレクティブを除く）
    pub const INSTRUCTIONS: [Keyword; 18] = [
        Keyword::From,
        Keyword::Run,
        Keyword::Cmd,
        Keyword::Label,
        Keyword::Maintainer,
        Keyword::Expose,
        Keyword::Env,
        Keyword::Add,
        Keyword::Copy,
        Keyword::Entrypoint,
        Keyword::Volume,
        Keyword::User,
        Keyword::Workdir,
        Keyword::Arg,
        Keyword::Onbuild,
        Keyword::Stopsignal,
        Keyword::Healthcheck,
        Keyword::Shell,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Directive => "DIRECTIVE",
            Keyword::From => "FROM",
            Keyword::Run => "RUN",
            Keyword::Cmd => "CMD",
            Keyword::Label => "LABEL",
            Keyword::Maintainer => "MAINTAINER",
            Keyword::Expose => "EXPOSE",
            Keyword::Env => "ENV",
            Keyword::Add => "ADD",
            Keyword::Copy => "COPY",
            Keyword::Entrypoint => "ENTRYPOINT",
            Keyword::Volume => "VOLUME",
            Keyword::User => "USER",
            Keyword::Workdir => "WORKDIR",
            Keyword::Arg => "ARG",
            Keyword::Onbuild => "ONBUILD",
            Keyword::Stopsignal => "STOPSIGNAL",
            Keyword::Healthcheck => "HEALTHCHECK",
            Keyword::Shell => "SHELL",
        }
    }

    /// 行頭のトークンからキーワードを判定（大文字小文字は区別しない）
    pub fn from_token(token: &str) -> Option<Keyword> {
        Self::INSTRUCTIONS
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(token))
    }

    /// JSON配列形式（exec形式）を受け付ける命令か
    pub fn accepts_exec_form(&self) -> bool {
        matches!(
            self,
            Keyword::Run | Keyword::Cmd | Keyword::Entrypoint | Keyword::Shell
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
