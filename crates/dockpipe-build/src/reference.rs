//! イメージ参照（`[registry/]repository[:tag][@digest]`）の検証

use crate::error::AssemblyError;
use std::fmt;
use std::str::FromStr;

/// 省略時のタグ
pub const DEFAULT_TAG: &str = "latest";

const MAX_NAME_LENGTH: usize = 255;
const MAX_TAG_LENGTH: usize = 128;

/// 検証済みのイメージ参照
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    registry: Option<String>,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self, AssemblyError> {
        let invalid = |reason: &str| AssemblyError::InvalidTag {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        if reference.is_empty() {
            return Err(invalid("reference is empty"));
        }

        let (rest, digest) = match reference.split_once('@') {
            Some((rest, digest)) => {
                validate_digest(digest).map_err(|reason| invalid(reason))?;
                (rest, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // 最後の ':' が最後の '/' より後ろにあればタグ（localhost:5000/app のポートと区別）
        let (name, tag) = match rest.rfind(':') {
            Some(pos) if !rest[pos + 1..].contains('/') => {
                let tag = &rest[pos + 1..];
                validate_tag(tag).map_err(|reason| invalid(reason))?;
                (&rest[..pos], Some(tag.to_string()))
            }
            _ => (rest, None),
        };

        if name.is_empty() {
            return Err(invalid("repository name is empty"));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(invalid("repository name must not exceed 255 characters"));
        }

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest)) if is_registry(first) => {
                validate_registry(first).map_err(|reason| invalid(reason))?;
                (Some(first.to_string()), rest)
            }
            _ => (None, name),
        };

        for component in repository.split('/') {
            validate_path_component(component).map_err(|reason| invalid(reason))?;
        }

        Ok(Self {
            registry,
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// タグ（省略時は `latest`、ダイジェスト指定のみの場合は None）
    pub fn tag(&self) -> Option<&str> {
        match (&self.tag, &self.digest) {
            (Some(tag), _) => Some(tag),
            (None, Some(_)) => None,
            (None, None) => Some(DEFAULT_TAG),
        }
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// レジストリを含むイメージ名（タグ・ダイジェストなし）
    pub fn name(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.repository),
            None => self.repository.clone(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl FromStr for ImageReference {
    type Err = AssemblyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_registry(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

fn validate_registry(registry: &str) -> Result<(), &'static str> {
    let (host, port) = match registry.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (registry, None),
    };
    if port.is_some_and(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return Err("registry port must be numeric");
    }
    let valid_label = |label: &str| {
        !label.is_empty()
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    };
    if host.split('.').all(valid_label) {
        Ok(())
    } else {
        Err("registry host is not a valid domain")
    }
}

/// `[a-z0-9]+` を `.` `_` `__` `-+` で区切ったもの
fn validate_path_component(component: &str) -> Result<(), &'static str> {
    if component.is_empty() {
        return Err("repository path has an empty component");
    }
    if component
        .chars()
        .any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')))
    {
        return Err("repository name must be lowercase alphanumerics separated by '.', '_' or '-'");
    }

    let bytes = component.as_bytes();
    if !bytes[0].is_ascii_alphanumeric() || !bytes[bytes.len() - 1].is_ascii_alphanumeric() {
        return Err("repository name components must start and end with an alphanumeric");
    }

    let mut separator = String::new();
    for c in component.chars() {
        if c.is_ascii_alphanumeric() {
            let ok = matches!(separator.as_str(), "" | "." | "_" | "__")
                || separator.chars().all(|s| s == '-');
            if !ok {
                return Err("repository name has an invalid separator");
            }
            separator.clear();
        } else {
            separator.push(c);
        }
    }
    Ok(())
}

/// `[\w][\w.-]{0,127}`
fn validate_tag(tag: &str) -> Result<(), &'static str> {
    if tag.is_empty() {
        return Err("tag is empty");
    }
    if tag.len() > MAX_TAG_LENGTH {
        return Err("tag must not exceed 128 characters");
    }
    if tag.starts_with('.') || tag.starts_with('-') {
        return Err("tag must not start with '.' or '-'");
    }
    if tag
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        Ok(())
    } else {
        Err("tag may only contain alphanumerics, '_', '.' and '-'")
    }
}

/// `algorithm:hex`（hex は32文字以上）
fn validate_digest(digest: &str) -> Result<(), &'static str> {
    let Some((algorithm, encoded)) = digest.split_once(':') else {
        return Err("digest must be in the form algorithm:hex");
    };
    let algorithm_ok = !algorithm.is_empty()
        && algorithm
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '_' | '-'));
    let encoded_ok = encoded.len() >= 32 && encoded.chars().all(|c| c.is_ascii_hexdigit());
    if algorithm_ok && encoded_ok {
        Ok(())
    } else {
        Err("digest is malformed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_parse_simple() {
        let r = ImageReference::parse("yourname/volume").unwrap();
        assert_eq!(r.registry(), None);
        assert_eq!(r.repository(), "yourname/volume");
        assert_eq!(r.tag(), Some("latest"));
        assert_eq!(r.to_string(), "yourname/volume");
    }

    #[test]
    fn test_parse_registry_with_port() {
        let r = ImageReference::parse("localhost:5000/app").unwrap();
        assert_eq!(r.registry(), Some("localhost:5000"));
        assert_eq!(r.repository(), "app");
        assert_eq!(r.tag(), Some("latest"));

        let r = ImageReference::parse("ghcr.io/org/app:v1.0").unwrap();
        assert_eq!(r.registry(), Some("ghcr.io"));
        assert_eq!(r.repository(), "org/app");
        assert_eq!(r.tag(), Some("v1.0"));
        assert_eq!(r.name(), "ghcr.io/org/app");
    }

    #[test]
    fn test_parse_digest() {
        let r = ImageReference::parse(&format!("alpine@{}", DIGEST)).unwrap();
        assert_eq!(r.tag(), None);
        assert_eq!(r.digest(), Some(DIGEST));

        let r = ImageReference::parse(&format!("alpine:3.20@{}", DIGEST)).unwrap();
        assert_eq!(r.tag(), Some("3.20"));
        assert_eq!(r.to_string(), format!("alpine:3.20@{}", DIGEST));
    }

    #[test]
    fn test_parse_separators() {
        assert!(ImageReference::parse("my_app").is_ok());
        assert!(ImageReference::parse("my__app").is_ok());
        assert!(ImageReference::parse("my---app").is_ok());
        assert!(ImageReference::parse("my.app").is_ok());
        assert!(ImageReference::parse("my___app").is_err());
        assert!(ImageReference::parse("my._app").is_err());
    }

    #[test]
    fn test_parse_invalid() {
        let cases = [
            "",
            "MyApp",
            "app:",
            "app:-bad",
            "app:has space",
            "/app",
            "org//app",
            "_app",
            "app@sha256:short",
            "registry.io:port/app",
        ];
        for case in cases {
            assert!(
                matches!(
                    ImageReference::parse(case),
                    Err(AssemblyError::InvalidTag { .. })
                ),
                "expected {:?} to be rejected",
                case
            );
        }

        let long_tag = format!("app:{}", "a".repeat(129));
        assert!(ImageReference::parse(&long_tag).is_err());
    }
}
