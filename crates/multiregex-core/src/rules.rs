//! 规则文件加载（TOML）
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::catalog;
use crate::error::ConfigError;
use crate::options::{StreamOptions, StreamPatch};
use crate::rule::Rule;
use crate::ruleset::RuleSet;

/// 单条规则的配置（支持 pattern 或 regex 字段）
#[derive(Debug, Clone, Deserialize)]
struct RuleEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
}

/// 顶层规则文件结构
#[derive(Debug, Clone, Deserialize)]
struct RawRuleFile {
    /// 先加入的内置规则名
    #[serde(default)]
    pub catalog: Vec<String>,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
    #[serde(default)]
    pub stream: Option<StreamPatch>,
}

/// 加载结果：规则集 + 流式参数（未在文件中出现的字段取默认值）
#[derive(Debug, Clone)]
pub struct RuleFile {
    pub rules: RuleSet,
    pub stream: StreamOptions,
}

/// 从 TOML 规则文件加载
pub fn load_rule_file(path: &Path) -> Result<RuleFile, ConfigError> {
    let txt = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rule_file(&txt).map_err(|e| match e {
        ParseFailure::Toml(source) => ConfigError::Parse { path: path.to_path_buf(), source },
        ParseFailure::Config(e) => e,
    })
}

enum ParseFailure {
    Toml(toml::de::Error),
    Config(ConfigError),
}

fn parse_rule_file(txt: &str) -> Result<RuleFile, ParseFailure> {
    let parsed: RawRuleFile = toml::from_str(txt).map_err(ParseFailure::Toml)?;

    let mut rules = catalog_rules(&parsed.catalog).map_err(ParseFailure::Config)?;
    for e in parsed.rules {
        // 兼容两种字段名：pattern 或 regex
        let pat = match (e.pattern, e.regex) {
            (Some(p), _) => p,
            (None, Some(r)) => r,
            _ => {
                warn!(id = e.id.as_str(), "rule has neither `pattern` nor `regex`, skipped");
                continue;
            }
        };
        // 单条规则编译失败不影响其它规则
        match Rule::named(&e.id, &pat) {
            Ok(rule) => rules.push(Arc::new(rule)),
            Err(err) => warn!(id = e.id.as_str(), name = ?e.name, error = %err, "rule skipped"),
        }
    }

    let mut stream = StreamOptions::default();
    if let Some(patch) = &parsed.stream {
        stream.apply(patch);
    }
    stream.validate().map_err(|e| ParseFailure::Config(e.into()))?;
    Ok(RuleFile { rules, stream })
}

/// 按名字取内置规则组成规则集
pub fn catalog_rules<S: AsRef<str>>(names: &[S]) -> Result<RuleSet, ConfigError> {
    names
        .iter()
        .map(|n| {
            let n = n.as_ref();
            if n == "default" {
                Ok(catalog::default_rules())
            } else {
                catalog::by_name(n)
                    .map(|r| RuleSet::from_iter([r]))
                    .ok_or_else(|| ConfigError::UnknownCatalog(n.to_string()))
            }
        })
        .try_fold(RuleSet::new(), |mut acc, set: Result<RuleSet, ConfigError>| {
            acc.extend(set?);
            Ok(acc)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_rules_catalog_and_stream() {
        let txt = r#"
catalog = ["cve"]

[stream]
overlap = 32
timeout_ms = 1500

[[rules]]
id = "aws"
pattern = "AKIA[0-9A-Z]{16}"

[[rules]]
id = "legacy"
regex = "sk-[A-Za-z0-9]{20,}"

[[rules]]
id = "broken"
pattern = "("

[[rules]]
id = "empty"
"#;
        let file = parse_rule_file(txt).ok().unwrap();
        assert_eq!(file.rules.ids(), vec!["cve", "aws", "legacy"]);
        assert_eq!(file.stream.overlap, 32);
        assert_eq!(file.stream.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn unknown_catalog_name_is_an_error() {
        assert!(matches!(
            catalog_rules(&["email", "nope"]),
            Err(ConfigError::UnknownCatalog(n)) if n == "nope"
        ));
        assert_eq!(catalog_rules(&["default"]).unwrap().len(), 3);
    }

    #[test]
    fn invalid_stream_table_is_rejected() {
        let txt = "[stream]\nwindow_size = 8\noverlap = 8\n";
        assert!(matches!(
            parse_rule_file(txt),
            Err(ParseFailure::Config(ConfigError::Options(_)))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_rule_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
