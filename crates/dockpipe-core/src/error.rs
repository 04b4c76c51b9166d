use crate::model::Keyword;
use std::path::PathBuf;
use thiserror::Error;

/// Dockerfileのパースに失敗した理由
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("unknown instruction: {0}")]
    UnknownInstruction(String),

    #[error("{0} requires at least one argument")]
    MissingArguments(Keyword),

    #[error("invalid FROM instruction: {0}")]
    InvalidFrom(String),

    #[error("SHELL requires the arguments to be in JSON form")]
    ShellRequiresExecForm,

    #[error("invalid value '{value}' for parser directive '{name}'")]
    InvalidDirective { name: String, value: String },

    #[error("parser directive '{0}' is specified more than once")]
    DuplicateDirective(String),

    #[error("parser directives must precede every instruction")]
    MisplacedDirective,

    #[error("no FROM instruction found")]
    NoFromInstruction,

    #[error("the first instruction must be FROM, found {0}")]
    FromNotFirst(Keyword),

    #[error("duplicate stage name: {0}")]
    DuplicateStageName(String),
}

/// 行番号付きのパースエラー
///
/// `line` はエラーの原因となった論理行が始まる物理行（1始まり）。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    pub reason: ParseErrorKind,
    pub line: usize,
}

impl ParseError {
    pub fn new(reason: ParseErrorKind, line: usize) -> Self {
        Self { reason, line }
    }
}

/// ファイルからDockerfileを読み込む際のエラー
#[derive(Error, Debug)]
pub enum DockerfileError {
    #[error("failed to read Dockerfile at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

pub type Result<T> = std::result::Result<T, ParseError>;
