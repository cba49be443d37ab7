//! 错误类型（对外暴露）
use std::path::PathBuf;

use thiserror::Error;

/// 规则编译失败
#[derive(Debug, Error)]
pub enum RuleError {
    /// 整块匹配 / 提取用的 bytes 正则无法编译
    #[error("rule `{id}`: invalid pattern: {source}")]
    Regex {
        id: String,
        #[source]
        source: regex::Error,
    },
}

/// 流式扫描的启动错误
///
/// 读源失败、取消、超时都不是错误，而是 [`crate::ScanStatus`]。
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid stream options: {0}")]
    InvalidOptions(String),
    #[error("failed to spawn scan thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// 规则文件加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read rule file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse rule file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown catalog rule `{0}`")]
    UnknownCatalog(String),
    #[error(transparent)]
    Options(#[from] ScanError),
}

/// 规则在求值过程中失败（例如惰性 DFA 缓存出错）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RuleEvalError(pub String);

/// 会话已被取消（子流读取 / 事件发送时返回）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("scan session canceled")]
pub struct Canceled;
