//! Dockerfileパーサー
//!
//! テキストを論理行に分割し、各行をキーワード付きの命令に変換します。
//! 入力テキストだけに依存する純粋関数で、副作用はありません。

mod lines;
mod words;


use crate::error::{DockerfileError, ParseError, ParseErrorKind, Result};
use crate::model::{ArgumentForm, DockerfileModel, Instruction, Keyword, LineRange};
use lines::{LogicalLine, logical_lines, read_header};
use std::path::Path;
use words::{exec_array, split_first_word, split_words};

/// Dockerfileのテキストをパース
pub fn parse(content: &str) -> Result<DockerfileModel> {
    let physical: Vec<&str> = content.lines().collect();
    let header = read_header(&physical)?;

    let body = &physical[header.consumed..];
    let logical = logical_lines(body, header.consumed + 1, header.escape);

    let mut instructions = header.directives;
    instructions.reserve(logical.len());
    for line in &logical {
        instructions.push(parse_instruction(line, header.escape)?);
    }

    let model = DockerfileModel::from_instructions(instructions)?;
    tracing::debug!(
        instructions = model.len(),
        stages = model.stages().len(),
        "Parsed Dockerfile"
    );
    Ok(model)
}

/// ファイルからDockerfileを読み込んでパース
pub fn parse_file<P: AsRef<Path>>(path: P) -> std::result::Result<DockerfileModel, DockerfileError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| DockerfileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content).map_err(|source| DockerfileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// 1つの論理行を命令に変換
fn parse_instruction(line: &LogicalLine, escape: char) -> Result<Instruction> {
    let (token, rest) = split_first_word(&line.text);
    let keyword = Keyword::from_token(token).ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::UnknownInstruction(token.to_string()),
            line.start,
        )
    })?;

    if rest.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::MissingArguments(keyword),
            line.start,
        ));
    }

    let (arguments, form) = if keyword.accepts_exec_form() {
        match exec_array(rest) {
            Some(array) => (array, ArgumentForm::Exec),
            None if keyword == Keyword::Shell => {
                return Err(ParseError::new(
                    ParseErrorKind::ShellRequiresExecForm,
                    line.start,
                ));
            }
            // JSONとして解釈できない場合はシェル形式として扱う
            None => (vec![rest.to_string()], ArgumentForm::Shell),
        }
    } else {
        (split_words(rest, escape), ArgumentForm::Words)
    };

    if keyword == Keyword::From {
        validate_from(&arguments, line.start)?;
    }

    Ok(Instruction::new(
        keyword,
        arguments,
        form,
        LineRange::new(line.start, line.end),
    ))
}

/// `FROM [--flag=value...] image [AS name]` の形か検証
fn validate_from(arguments: &[String], line: usize) -> Result<()> {
    let invalid = |detail: &str| {
        Err(ParseError::new(
            ParseErrorKind::InvalidFrom(detail.to_string()),
            line,
        ))
    };

    let positional: Vec<&String> = arguments.iter().filter(|a| !a.starts_with("--")).collect();
    match positional.as_slice() {
        [] => invalid("missing base image"),
        [_] => Ok(()),
        [_, as_kw, _name] if as_kw.eq_ignore_ascii_case("AS") => Ok(()),
        [_, as_kw] if as_kw.eq_ignore_ascii_case("AS") => invalid("missing stage name after AS"),
        _ => invalid(&format!("unexpected arguments: {}", arguments.join(" "))),
    }
}
