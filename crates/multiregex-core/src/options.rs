//! 扫描选项与统计信息（模块）
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ScanError;

/// 流式扫描参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// 泵每次从源读取的块大小
    pub chunk_size: usize,
    /// 每个子流的有界队列深度（以块计）
    pub queue_depth: usize,
    /// 滑动窗口容量 W（提取模式，以及没有惰性 DFA 的规则的布尔测试）
    pub window_size: usize,
    /// 窗口之间保留的重叠字节数 O；跨窗口的命中只有长度 ≤ O 时保证能找到
    pub overlap: usize,
    /// 整个会话的超时；None 表示只受调用方取消令牌控制
    pub timeout: Option<Duration>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            queue_depth: 4,
            window_size: 1024 * 1024,
            overlap: 1024,
            timeout: None,
        }
    }
}

impl StreamOptions {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.chunk_size == 0 {
            return Err(ScanError::InvalidOptions("chunk_size must be > 0".into()));
        }
        if self.queue_depth == 0 {
            return Err(ScanError::InvalidOptions("queue_depth must be > 0".into()));
        }
        if self.overlap >= self.window_size {
            return Err(ScanError::InvalidOptions(format!(
                "overlap ({}) must be smaller than window_size ({})",
                self.overlap, self.window_size
            )));
        }
        Ok(())
    }

    /// 用规则文件 `[stream]` 表中出现的字段覆盖当前值
    pub(crate) fn apply(&mut self, patch: &StreamPatch) {
        if let Some(v) = patch.chunk_size {
            self.chunk_size = v;
        }
        if let Some(v) = patch.queue_depth {
            self.queue_depth = v;
        }
        if let Some(v) = patch.window_size {
            self.window_size = v;
        }
        if let Some(v) = patch.overlap {
            self.overlap = v;
        }
        if let Some(ms) = patch.timeout_ms {
            self.timeout = Some(Duration::from_millis(ms));
        }
    }
}

/// 规则文件里的 `[stream]` 表（全部可选）
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StreamPatch {
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub queue_depth: Option<usize>,
    #[serde(default)]
    pub window_size: Option<usize>,
    #[serde(default)]
    pub overlap: Option<usize>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// 扫描模式
/// - Any：任一规则命中即短路返回
/// - All：等待所有规则读完，返回命中规则集合
/// - Extract：提取所有命中区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Any,
    All,
    Extract,
}

/// 批量扫描选项
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub mode: ScanMode,
    /// 最大文件大小（字节）；超过则跳过
    pub max_file_size: Option<u64>,
    /// 规则文件路径（TOML）；为空且 catalog 也为空时使用 ./rules/default.toml
    pub rules_path: Option<PathBuf>,
    /// 额外启用的内置规则名
    pub catalog: Vec<String>,
    /// 线程数：None 表示自动（等于 CPU 核数）
    pub threads: Option<usize>,
    /// 流式参数；None 表示使用规则文件 `[stream]` 表或默认值
    pub stream: Option<StreamOptions>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            mode: ScanMode::All,
            max_file_size: None,
            rules_path: None,
            catalog: Vec::new(),
            threads: None,
            stream: None,
        }
    }
}

/// 扫描统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub files_matched: usize,
    pub files_failed: usize,
    pub outputs_written: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StreamOptions::default().validate().is_ok());
    }

    #[test]
    fn overlap_must_fit_window() {
        let opts = StreamOptions { window_size: 16, overlap: 16, ..Default::default() };
        assert!(matches!(opts.validate(), Err(ScanError::InvalidOptions(_))));
    }

    #[test]
    fn patch_overrides_only_given_fields() {
        let mut opts = StreamOptions::default();
        opts.apply(&StreamPatch { overlap: Some(64), timeout_ms: Some(250), ..Default::default() });
        assert_eq!(opts.overlap, 64);
        assert_eq!(opts.timeout, Some(Duration::from_millis(250)));
        assert_eq!(opts.chunk_size, 1024);
    }
}
