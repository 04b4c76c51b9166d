use colored::Colorize;
use dockpipe_build::ProgressEvent;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// ビルド進捗の表示（スピナー + ステップ出力）
pub struct BuildProgress {
    progress_bar: ProgressBar,
}

impl BuildProgress {
    pub fn new(image: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("Building {}...", image));
        pb.enable_steady_tick(Duration::from_millis(120));

        Self { progress_bar: pb }
    }

    /// イベントを1つ表示
    pub fn handle(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Stream(text) => {
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    if line.starts_with("Step ") {
                        self.progress_bar.println(line.bold().to_string());
                        self.progress_bar.set_message(line.to_string());
                    } else {
                        self.progress_bar.println(format!("  {}", line));
                    }
                }
            }
            ProgressEvent::Status {
                id,
                status,
                progress,
            } => {
                let mut msg = match id {
                    Some(id) => format!("{}: {}", id, status),
                    None => status.clone(),
                };
                if let Some(progress) = progress {
                    msg.push(' ');
                    msg.push_str(progress);
                }
                self.progress_bar.set_message(msg);
            }
            ProgressEvent::ErrorDetail { message, .. } => {
                self.progress_bar
                    .println(format!("{} {}", "✗".red().bold(), message.red()));
            }
            ProgressEvent::Aux { raw, malformed } => {
                if *malformed {
                    let text = if raw.is_empty() {
                        "(長すぎる行を読み捨てました)".to_string()
                    } else {
                        String::from_utf8_lossy(raw).to_string()
                    };
                    self.progress_bar
                        .println(format!("  {} {}", "⚠".yellow(), text.dimmed()));
                } else if let Some(id) = event.image_id() {
                    self.progress_bar.set_message(format!("image {}", id));
                }
            }
        }
    }

    pub fn finish_success(&self, image: &str) {
        self.progress_bar
            .finish_with_message(format!("{} {}", "Build completed ✓".green(), image.cyan()));
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .finish_with_message(format!("{} {}", "Build failed:".red(), error));
    }
}
