//! モデル定義
//!
//! パース済みDockerfileのデータモデルを定義します。

mod instruction;
mod keyword;
mod stage;

pub use instruction::*;
pub use keyword::*;
pub use stage::*;

use crate::error::{ParseError, ParseErrorKind, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// パース済みDockerfile
///
/// 命令列と、そこから導出したキーワード索引・ステージ境界を保持する。
/// 最初の非ディレクティブ命令は必ず `FROM`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DockerfileModel {
    instructions: Vec<Instruction>,
    stages: Vec<Stage>,
    #[serde(skip)]
    index: BTreeMap<Keyword, Vec<usize>>,
}

impl DockerfileModel {
    /// 命令列からモデルを構築し、不変条件を検証する
    pub fn from_instructions(instructions: Vec<Instruction>) -> Result<Self> {
        let Some(first) = instructions.iter().position(|i| !i.is_directive()) else {
            let line = instructions.last().map(|i| i.lines().end + 1).unwrap_or(1);
            return Err(ParseError::new(ParseErrorKind::NoFromInstruction, line));
        };

        let head = &instructions[first];
        if head.keyword() != Keyword::From {
            return Err(ParseError::new(
                ParseErrorKind::FromNotFirst(head.keyword()),
                head.lines().start,
            ));
        }

        // ディレクティブは先頭にしか置けない
        if let Some(misplaced) = instructions[first..].iter().find(|i| i.is_directive()) {
            return Err(ParseError::new(
                ParseErrorKind::MisplacedDirective,
                misplaced.lines().start,
            ));
        }

        let mut index: BTreeMap<Keyword, Vec<usize>> = BTreeMap::new();
        for (i, instruction) in instructions.iter().enumerate() {
            index.entry(instruction.keyword()).or_default().push(i);
        }

        let stages = build_stages(&instructions, &index[&Keyword::From])?;

        Ok(Self {
            instructions,
            stages,
            index,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// 先頭のパーサーディレクティブ
    pub fn directives(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().take_while(|i| i.is_directive())
    }

    /// ディレクティブの値を名前で取得（例: `syntax`）
    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives()
            .find(|d| d.arguments().first().is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .and_then(|d| d.arguments().get(1))
            .map(String::as_str)
    }

    /// キーワードに一致する命令のインデックス（出現順）
    pub fn positions(&self, keyword: Keyword) -> &[usize] {
        self.index.get(&keyword).map(Vec::as_slice).unwrap_or(&[])
    }

    /// キーワードに一致する命令（出現順）
    pub fn by_keyword(&self, keyword: Keyword) -> impl Iterator<Item = &Instruction> {
        self.positions(keyword)
            .iter()
            .map(move |&i| &self.instructions[i])
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// 名前またはステージ番号でステージを検索
    pub fn stage(&self, reference: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.matches(reference))
    }

    pub fn stage_instructions(&self, stage: &Stage) -> &[Instruction] {
        &self.instructions[stage.instructions.clone()]
    }

    /// ARGで宣言されたビルド引数名
    pub fn declared_args(&self) -> BTreeSet<&str> {
        self.by_keyword(Keyword::Arg)
            .flat_map(Instruction::declared_args)
            .collect()
    }

    /// 行番号を無視して同じ命令列か
    pub fn is_equivalent(&self, other: &DockerfileModel) -> bool {
        self.instructions.len() == other.instructions.len()
            && self
                .instructions
                .iter()
                .zip(&other.instructions)
                .all(|(a, b)| a.same_shape(b))
    }

    /// 正規化されたDockerfileテキストを生成
    ///
    /// 継続行は1行にまとめられ、コメントは出力されない。
    pub fn to_dockerfile(&self) -> String {
        let mut out = String::new();
        for instruction in &self.instructions {
            out.push_str(&instruction.render());
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for DockerfileModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dockerfile())
    }
}

fn build_stages(instructions: &[Instruction], from_positions: &[usize]) -> Result<Vec<Stage>> {
    let mut stages: Vec<Stage> = Vec::with_capacity(from_positions.len());

    for (n, &start) in from_positions.iter().enumerate() {
        let end = from_positions
            .get(n + 1)
            .copied()
            .unwrap_or(instructions.len());
        let from = &instructions[start];
        let name = from.stage_name().map(str::to_string);

        if let Some(name) = &name {
            let taken = stages
                .iter()
                .any(|s| s.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)));
            if taken {
                return Err(ParseError::new(
                    ParseErrorKind::DuplicateStageName(name.clone()),
                    from.lines().start,
                ));
            }
        }

        stages.push(Stage {
            index: n,
            name,
            base_image: from.base_image().unwrap_or_default().to_string(),
            instructions: start..end,
        });
    }

    Ok(stages)
}
