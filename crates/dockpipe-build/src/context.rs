//! ビルドコンテキストの供給元

use bytes::Bytes;
use glob::{MatchOptions, Pattern};
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use tar::Builder;

/// ビルドコンテキストをtar（またはtar.gz）ストリームとして供給する
///
/// `open` は1回のビルドにつき1度だけ呼ばれる。
pub trait ContextProvider {
    /// ログとエラーメッセージ用の説明
    fn describe(&self) -> String;

    fn open(&mut self) -> io::Result<Box<dyn Read + '_>>;
}

/// ファイルを含まないコンテキスト（Dockerfileのみでビルド）
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyContext;

impl ContextProvider for EmptyContext {
    fn describe(&self) -> String {
        "empty context".to_string()
    }

    fn open(&mut self) -> io::Result<Box<dyn Read + '_>> {
        let archive = Builder::new(Vec::new()).into_inner()?;
        Ok(Box::new(Cursor::new(archive)))
    }
}

/// 既存のtar / tar.gzアーカイブ
#[derive(Debug, Clone)]
pub enum TarContext {
    Memory(Bytes),
    File(PathBuf),
}

impl TarContext {
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        TarContext::Memory(bytes.into())
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        TarContext::File(path.into())
    }
}

impl ContextProvider for TarContext {
    fn describe(&self) -> String {
        match self {
            TarContext::Memory(bytes) => format!("in-memory archive ({} bytes)", bytes.len()),
            TarContext::File(path) => format!("archive {}", path.display()),
        }
    }

    fn open(&mut self) -> io::Result<Box<dyn Read + '_>> {
        match self {
            TarContext::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            TarContext::File(path) => Ok(Box::new(File::open(path)?)),
        }
    }
}

/// ディレクトリをtarにまとめるコンテキスト
///
/// ルートの `.dockerignore` に一致するパスは含めない。
#[derive(Debug, Clone)]
pub struct DirectoryContext {
    root: PathBuf,
}

impl DirectoryContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn archive(&self) -> io::Result<Vec<u8>> {
        tracing::debug!("Creating build context from: {}", self.root.display());

        let metadata = fs::metadata(&self.root)?;
        if !metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", self.root.display()),
            ));
        }

        let ignore = match fs::read_to_string(self.root.join(".dockerignore")) {
            Ok(content) => DockerIgnore::parse(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => DockerIgnore::default(),
            Err(e) => return Err(e),
        };

        let mut tar = Builder::new(Vec::new());
        tar.follow_symlinks(false);
        let mut skipped = 0usize;
        self.append_dir(&mut tar, &self.root, "", &ignore, &mut skipped)?;
        let archive = tar.into_inner()?;

        tracing::debug!(
            "Directory context archived: {} bytes ({} paths excluded by .dockerignore)",
            archive.len(),
            skipped
        );
        Ok(archive)
    }

    fn append_dir(
        &self,
        tar: &mut Builder<Vec<u8>>,
        dir: &Path,
        prefix: &str,
        ignore: &DockerIgnore,
        skipped: &mut usize,
    ) -> io::Result<()> {
        let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };
            let path = entry.path();
            let file_type = entry.file_type()?;

            if ignore.is_excluded(&relative) {
                // 除外ディレクトリ内に例外パターンがあれば潜る
                if !(file_type.is_dir() && ignore.has_exceptions_under(&relative)) {
                    *skipped += 1;
                    continue;
                }
                self.append_dir(tar, &path, &relative, ignore, skipped)?;
                continue;
            }

            if file_type.is_dir() {
                tar.append_dir(&relative, &path)?;
                self.append_dir(tar, &path, &relative, ignore, skipped)?;
            } else {
                tar.append_path_with_name(&path, &relative)?;
            }
        }
        Ok(())
    }
}

impl ContextProvider for DirectoryContext {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    fn open(&mut self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.archive()?)))
    }
}

/// `.dockerignore` のルール（後に書かれたものが優先）
#[derive(Debug, Default)]
struct DockerIgnore {
    rules: Vec<IgnoreRule>,
}

#[derive(Debug)]
struct IgnoreRule {
    pattern: Pattern,
    source: String,
    exception: bool,
}

impl DockerIgnore {
    fn parse(content: &str) -> Self {
        let mut rules = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (exception, raw) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let cleaned = clean_pattern(raw);
            if cleaned.is_empty() {
                continue;
            }
            match Pattern::new(&cleaned) {
                Ok(pattern) => rules.push(IgnoreRule {
                    pattern,
                    source: cleaned,
                    exception,
                }),
                Err(e) => tracing::warn!("Ignoring invalid .dockerignore pattern '{}': {}", raw, e),
            }
        }
        Self { rules }
    }

    fn is_excluded(&self, relative: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let mut excluded = false;
        for rule in &self.rules {
            // パターンはパス自身または親ディレクトリに一致すればよい
            let matched = ancestors(relative).any(|p| rule.pattern.matches_with(p, options));
            if matched {
                excluded = !rule.exception;
            }
        }
        excluded
    }

    fn has_exceptions_under(&self, dir: &str) -> bool {
        let prefix = format!("{}/", dir);
        self.rules
            .iter()
            .any(|rule| rule.exception && (rule.source.starts_with(&prefix) || rule.source.starts_with("**")))
    }
}

/// `a/b/c` -> `a`, `a/b`, `a/b/c`
fn ancestors(relative: &str) -> impl Iterator<Item = &str> {
    relative
        .match_indices('/')
        .map(move |(i, _)| &relative[..i])
        .chain(std::iter::once(relative))
}

fn clean_pattern(raw: &str) -> String {
    let mut parts = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
