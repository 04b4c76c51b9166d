//! ステージ定義

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// `FROM` から次の `FROM` の直前までのビルドステージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// 0始まりのステージ番号
    pub index: usize,
    /// `FROM image AS name` で付けられた名前
    pub name: Option<String>,
    /// ベースイメージ
    pub base_image: String,
    /// このステージに属する命令のインデックス範囲（FROM自身を含む）
    pub instructions: Range<usize>,
}

impl Stage {
    /// 名前またはステージ番号で一致するか（Dockerと同じく名前は大文字小文字を区別しない）
    pub fn matches(&self, reference: &str) -> bool {
        match &self.name {
            Some(name) if name.eq_ignore_ascii_case(reference) => true,
            _ => reference.parse::<usize>().is_ok_and(|i| i == self.index),
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
