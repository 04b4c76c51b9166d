use crate::context::ContextProvider;
use crate::error::AssemblyError;
use crate::options::BuildOptions;
use crate::reference::ImageReference;
use bytes::Bytes;
use dockpipe_core::DockerfileModel;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{self, Read};
use tar::{Archive, Builder};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// エンジンに送信する準備が整ったビルドリクエスト
#[derive(Debug, Clone)]
pub struct BuildRequest {
    context: Bytes,
    dockerfile: DockerfileModel,
    tag: ImageReference,
    options: BuildOptions,
}

impl BuildRequest {
    /// gzip圧縮済みのtarコンテキスト
    pub fn context(&self) -> &Bytes {
        &self.context
    }

    pub fn dockerfile(&self) -> &DockerfileModel {
        &self.dockerfile
    }

    pub fn tag(&self) -> &ImageReference {
        &self.tag
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// `/build` に付けるクエリ文字列
    pub fn query_string(&self) -> String {
        self.options.query_string(&self.tag)
    }

    pub(crate) fn into_context(self) -> Bytes {
        self.context
    }
}

/// Dockerfileモデルとコンテキストからビルドリクエストを組み立てる
///
/// コンテキストに `options.dockerfile` が含まれていなければ、モデルの正規化テキストを
/// その名前で追加する。コンテキスト側のDockerfileがある場合はそちらを優先する。
pub fn assemble<C>(
    model: DockerfileModel,
    context: &mut C,
    tag: &str,
    options: BuildOptions,
) -> Result<BuildRequest, AssemblyError>
where
    C: ContextProvider + ?Sized,
{
    let tag = ImageReference::parse(tag)?;

    if let Some(target) = &options.target {
        if model.stage(target).is_none() {
            return Err(AssemblyError::UnknownTarget(target.clone()));
        }
    }

    let declared = model.declared_args();
    for key in options.build_args.keys() {
        if !declared.contains(key.as_str()) {
            tracing::warn!("Build arg {} is not declared by any ARG instruction", key);
        }
    }

    let description = context.describe();
    let context_error = |source: io::Error| AssemblyError::Context {
        context: description.clone(),
        source,
    };

    let mut raw = Vec::new();
    context
        .open()
        .and_then(|mut reader| reader.read_to_end(&mut raw))
        .map_err(context_error)?;

    let archive = repack(&raw, &options.dockerfile, &model.to_dockerfile()).map_err(context_error)?;
    tracing::debug!(
        "Build context assembled from {}: {} bytes (gzip)",
        description,
        archive.len()
    );
    check_context_size(archive.len());

    Ok(BuildRequest {
        context: Bytes::from(archive),
        dockerfile: model,
        tag,
        options,
    })
}

/// 入力tarの全エントリを新しいtar.gzへコピーし、必要ならDockerfileを追加
fn repack(raw: &[u8], dockerfile_name: &str, dockerfile_text: &str) -> io::Result<Vec<u8>> {
    let reader: Box<dyn Read + '_> = if raw.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(raw))
    } else {
        Box::new(raw)
    };
    let mut input = Archive::new(reader);
    let wanted = normalize_entry_path(dockerfile_name);

    let mut archive_data = Vec::new();
    {
        let encoder = GzEncoder::new(&mut archive_data, Compression::default());
        let mut tar = Builder::new(encoder);
        let mut has_dockerfile = false;

        for entry in input.entries()? {
            let mut entry = entry?;
            let path = normalize_entry_path(&entry.path()?.to_string_lossy());
            // ルートディレクトリ自身（"./"）
            if path.is_empty() {
                continue;
            }
            if path == wanted {
                has_dockerfile = true;
            }
            let mut header = entry.header().clone();
            match entry.link_name()?.map(|link| link.into_owned()) {
                Some(link) => tar.append_link(&mut header, &path, &link)?,
                None => tar.append_data(&mut header, &path, &mut entry)?,
            }
        }

        if has_dockerfile {
            tracing::debug!("Using {} supplied by the build context", wanted);
        } else {
            let mut header = tar::Header::new_gnu();
            header.set_size(dockerfile_text.len() as u64);
            header.set_mode(0o644);
            tar.append_data(&mut header, &wanted, dockerfile_text.as_bytes())?;
        }

        tar.into_inner()?.finish()?;
    }
    Ok(archive_data)
}

fn normalize_entry_path(path: &str) -> String {
    let mut trimmed = path.trim_start_matches('/');
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest.trim_start_matches('/');
    }
    match trimmed.trim_end_matches('/') {
        "." => String::new(),
        other => other.to_string(),
    }
}

/// コンテキストサイズのチェックと警告
fn check_context_size(size: usize) {
    const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

    if size > MAX_CONTEXT_SIZE {
        tracing::warn!(
            "警告: ビルドコンテキストが大きすぎます（{}MB）\n\
             .dockerignoreファイルで不要なファイルを除外することを推奨します。",
            size / 1024 / 1024
        );
    }
}
