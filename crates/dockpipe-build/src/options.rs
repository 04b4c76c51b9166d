use crate::reference::ImageReference;
use std::collections::BTreeMap;

/// 既定のDockerfile名
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// ビルドオプション
///
/// エンジンの `/build` クエリパラメータに対応する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// コンテキスト内のDockerfileのパス
    pub dockerfile: String,
    /// 成功時に中間コンテナを削除（rm）
    pub remove_intermediate: bool,
    /// 失敗時も中間コンテナを削除（forcerm）
    pub force_remove: bool,
    pub no_cache: bool,
    /// ベースイメージを常にpull
    pub pull: bool,
    /// ビルド出力を抑制（q）
    pub quiet: bool,
    pub target: Option<String>,
    pub platform: Option<String>,
    pub build_args: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            dockerfile: DEFAULT_DOCKERFILE.to_string(),
            remove_intermediate: true,
            force_remove: false,
            no_cache: false,
            pull: false,
            quiet: false,
            target: None,
            platform: None,
            build_args: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }
}

impl BuildOptions {
    pub fn with_build_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.build_args.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// エンジンに送るクエリパラメータ
    pub fn query_pairs(&self, tag: &ImageReference) -> Vec<(&'static str, String)> {
        let flag = |value: bool| (if value { "1" } else { "0" }).to_string();

        let mut pairs = vec![
            ("t", tag.to_string()),
            ("rm", flag(self.remove_intermediate)),
            ("dockerfile", self.dockerfile.clone()),
        ];
        if self.force_remove {
            pairs.push(("forcerm", flag(true)));
        }
        if self.no_cache {
            pairs.push(("nocache", flag(true)));
        }
        if self.pull {
            pairs.push(("pull", flag(true)));
        }
        if self.quiet {
            pairs.push(("q", flag(true)));
        }
        if let Some(target) = &self.target {
            pairs.push(("target", target.clone()));
        }
        if let Some(platform) = &self.platform {
            pairs.push(("platform", platform.clone()));
        }
        if !self.build_args.is_empty() {
            pairs.push(("buildargs", serde_json::json!(self.build_args).to_string()));
        }
        if !self.labels.is_empty() {
            pairs.push(("labels", serde_json::json!(self.labels).to_string()));
        }
        pairs
    }

    /// URLエンコード済みのクエリ文字列
    pub fn query_string(&self, tag: &ImageReference) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query_pairs(tag))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag() -> ImageReference {
        ImageReference::parse("yourname/volume").unwrap()
    }

    #[test]
    fn test_default_query() {
        let pairs = BuildOptions::default().query_pairs(&tag());
        assert_eq!(
            pairs,
            vec![
                ("t", "yourname/volume".to_string()),
                ("rm", "1".to_string()),
                ("dockerfile", "Dockerfile".to_string()),
            ]
        );
        assert_eq!(
            BuildOptions::default().query_string(&tag()),
            "t=yourname%2Fvolume&rm=1&dockerfile=Dockerfile"
        );
    }

    #[test]
    fn test_full_query() {
        let options = BuildOptions {
            remove_intermediate: false,
            force_remove: true,
            no_cache: true,
            pull: true,
            quiet: true,
            platform: Some("linux/arm64".to_string()),
            ..Default::default()
        }
        .with_target("runtime")
        .with_build_arg("VERSION", "1.2")
        .with_label("team", "ops");

        let pairs = options.query_pairs(&tag());
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("rm"), Some("0"));
        assert_eq!(get("forcerm"), Some("1"));
        assert_eq!(get("nocache"), Some("1"));
        assert_eq!(get("pull"), Some("1"));
        assert_eq!(get("q"), Some("1"));
        assert_eq!(get("target"), Some("runtime"));
        assert_eq!(get("platform"), Some("linux/arm64"));
        assert_eq!(get("buildargs"), Some(r#"{"VERSION":"1.2"}"#));
        assert_eq!(get("labels"), Some(r#"{"team":"ops"}"#));
    }
}
