use crate::progress::BuildProgress;
use anyhow::Context;
use clap::Args;
use colored::Colorize;
use dockpipe_build::{
    BuildClient, BuildError, BuildOptions, DEFAULT_DOCKERFILE, DirectoryContext, EmptyContext,
    ProgressEvent, assemble,
};
use dockpipe_config::EngineConfig;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};

/// コンテキスト外のDockerfileを同梱する際の名前
const EXTERNAL_DOCKERFILE: &str = ".dockpipe/Dockerfile";

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// ビルドコンテキストのディレクトリ（省略時はDockerfileのみを送信）
    pub context: Option<PathBuf>,

    /// Dockerfileのパス（省略時は CONTEXT/Dockerfile）
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// イメージ名とタグ（例: myapp:1.0）
    #[arg(short, long)]
    pub tag: String,

    /// キャッシュを使わずにビルド
    #[arg(long)]
    pub no_cache: bool,

    /// ベースイメージを常にpull
    #[arg(long)]
    pub pull: bool,

    /// 失敗時も中間コンテナを削除
    #[arg(long)]
    pub force_rm: bool,

    /// 成功時も中間コンテナを残す
    #[arg(long)]
    pub no_rm: bool,

    /// ビルド出力を抑制（イメージIDのみ）
    #[arg(short, long)]
    pub quiet: bool,

    /// ビルドするステージ
    #[arg(long)]
    pub target: Option<String>,

    /// ターゲットプラットフォーム（例: linux/amd64）
    #[arg(long)]
    pub platform: Option<String>,

    /// ビルド引数（KEY=VALUE、複数指定可）
    #[arg(long = "build-arg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub build_args: Vec<(String, String)>,

    /// イメージに付けるラベル（KEY=VALUE、複数指定可）
    #[arg(long = "label", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub labels: Vec<(String, String)>,

    /// エンジンの接続先（例: unix:///var/run/docker.sock, tcp://127.0.0.1:2375）
    #[arg(long)]
    pub host: Option<String>,

    /// 進捗イベントを1行1JSONで出力
    #[arg(long)]
    pub json: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("KEY=VALUE 形式で指定してください: {}", s)),
    }
}

impl BuildArgs {
    fn dockerfile_path(&self) -> PathBuf {
        match (&self.file, &self.context) {
            (Some(file), _) => file.clone(),
            (None, Some(context)) => context.join(DEFAULT_DOCKERFILE),
            (None, None) => PathBuf::from(DEFAULT_DOCKERFILE),
        }
    }

    /// コンテキスト内でのDockerfileの名前
    fn dockerfile_name(&self, dockerfile: &Path) -> String {
        let Some(context) = &self.context else {
            return DEFAULT_DOCKERFILE.to_string();
        };
        let relative = match (context.canonicalize(), dockerfile.canonicalize()) {
            (Ok(context), Ok(dockerfile)) => dockerfile
                .strip_prefix(&context)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/")),
            _ => None,
        };
        relative.unwrap_or_else(|| EXTERNAL_DOCKERFILE.to_string())
    }

    fn options(&self, dockerfile: String) -> BuildOptions {
        BuildOptions {
            dockerfile,
            remove_intermediate: !self.no_rm,
            force_remove: self.force_rm,
            no_cache: self.no_cache,
            pull: self.pull,
            quiet: self.quiet,
            target: self.target.clone(),
            platform: self.platform.clone(),
            build_args: self.build_args.iter().cloned().collect(),
            labels: self.labels.iter().cloned().collect(),
        }
    }
}

/// ビルドコマンドを処理
pub async fn handle(args: BuildArgs) -> anyhow::Result<()> {
    let dockerfile_path = args.dockerfile_path();
    let content = std::fs::read_to_string(&dockerfile_path)
        .with_context(|| format!("Dockerfileを読み込めません: {}", dockerfile_path.display()))?;
    let model = dockpipe_core::parse(&content).map_err(BuildError::from)?;

    let config = EngineConfig::load(args.host.as_deref()).map_err(BuildError::from)?;
    let options = args.options(args.dockerfile_name(&dockerfile_path));

    let request = match &args.context {
        Some(dir) => assemble(model, &mut DirectoryContext::new(dir), &args.tag, options),
        None => assemble(model, &mut EmptyContext, &args.tag, options),
    }
    .map_err(BuildError::from)?;
    let image = request.tag().to_string();

    if !args.json {
        println!("{}", "イメージをビルド中...".green());
        println!(
            "  → Dockerfile: {}",
            dockerfile_path.display().to_string().cyan()
        );
        let context = args
            .context
            .as_ref()
            .map(|c| c.display().to_string())
            .unwrap_or_else(|| "(なし)".to_string());
        println!("  → Context: {}", context.cyan());
        println!("  → Image: {}", image.cyan());
        println!("  → Engine: {}", config.endpoint.to_string().cyan());
        println!();
    }

    let client = BuildClient::new(config);
    let mut stream = client.submit(request).await.map_err(BuildError::from)?;
    let progress = (!args.json).then(|| BuildProgress::new(&image));

    let mut image_id = None;
    loop {
        let next = tokio::select! {
            next = stream.next() => Some(next),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(next) = next else {
            // ストリームを破棄すると接続が閉じる
            drop(stream);
            if let Some(progress) = &progress {
                progress.finish_error("中断されました");
            }
            anyhow::bail!("ビルドを中断しました");
        };
        let Some(next) = next else {
            break;
        };

        let event = match next {
            Ok(event) => event,
            Err(e) => {
                if let Some(progress) = &progress {
                    progress.finish_error(&e.to_string());
                }
                return Err(BuildError::from(e).into());
            }
        };

        if args.json {
            println!("{}", serde_json::to_string(&event)?);
        } else if let Some(progress) = &progress {
            progress.handle(&event);
        }

        if let Some(id) = event.image_id() {
            image_id = Some(id);
        }
        if let ProgressEvent::ErrorDetail { message, code } = event {
            if let Some(progress) = &progress {
                progress.finish_error(&message);
            }
            return Err(BuildError::BuildFailed { message, code }.into());
        }
    }

    tracing::info!("Successfully built: {}", image);
    if let Some(progress) = &progress {
        progress.finish_success(&image);
        if let Some(id) = &image_id {
            println!("  イメージID: {}", id.dimmed());
        }
    }
    Ok(())
}
