mod commands;
mod progress;

use clap::{Parser, Subcommand};
use colored::Colorize;
use dockpipe_build::BuildError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dockpipe")]
#[command(
    about = "Dockerfileを解析し、ビルドの進捗をそのまま受け取る。",
    long_about = None
)]
struct Cli {
    /// デバッグログを表示
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dockerfileを解析して構造を表示
    Parse {
        /// Dockerfileのパス（- で標準入力）
        #[arg(default_value = "Dockerfile")]
        file: String,
        /// 構造をJSONで出力
        #[arg(long)]
        json: bool,
    },
    /// イメージをビルド
    Build(commands::build::BuildArgs),
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログはstderrへ（stdoutはビルド出力とJSON用）
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Parse { file, json } => commands::parse::handle(&file, json),
        Commands::Build(args) => commands::build::handle(args).await,
        Commands::Version => {
            println!("dockpipe {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!();
        match e.downcast_ref::<BuildError>() {
            Some(build_error) => eprintln!("{} {}", "✗".red().bold(), build_error.user_message()),
            None => eprintln!("{} {:#}", "✗".red().bold(), e),
        }
        std::process::exit(1);
    }

    Ok(())
}
