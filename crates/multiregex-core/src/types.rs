//! 公共类型（对外暴露）
use serde::Serialize;

/// 流式扫描的结束状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// 源读到 EOF，或所有规则在 EOF 之前都已有结论
    Completed,
    /// "任一匹配"模式命中后主动停止
    ShortCircuited,
    /// 调用方取消
    Canceled,
    /// 超过配置的会话超时
    DeadlineExceeded,
    /// 读源失败；失败之前读到的数据仍参与了匹配
    SourceFailed {
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl ScanStatus {
    /// 结果是否覆盖了全部输入（或已被命中提前确定）
    pub fn is_definite(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::ShortCircuited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Completed => "completed",
            ScanStatus::ShortCircuited => "short_circuited",
            ScanStatus::Canceled => "canceled",
            ScanStatus::DeadlineExceeded => "deadline_exceeded",
            ScanStatus::SourceFailed { .. } => "source_failed",
        }
    }
}

/// 单条规则在扫描中的诊断（求值失败、worker 崩溃）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDiagnostic {
    pub index: usize,
    pub rule_id: String,
    pub message: String,
}

/// 与结果一起返回的扫描报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub status: ScanStatus,
    pub bytes_read: u64,
    pub diagnostics: Vec<RuleDiagnostic>,
}

/// 结果 + 报告；错误与部分结果一起返回，而不是替代结果
#[derive(Debug, Clone)]
pub struct ScanOutcome<T> {
    pub value: T,
    pub report: ScanReport,
}

/// "任一匹配"的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Matched,
    NotMatched,
    /// 在得出结论之前被取消或超时
    Indeterminate,
}

impl Verdict {
    pub fn is_match(self) -> bool {
        self == Verdict::Matched
    }
}

/// 批量扫描中单个文件的输出项（对应 JSON 数组的一个元素）
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<MatchItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<RuleDiagnostic>,
}

/// 提取模式下的单个命中
#[derive(Debug, Clone, Serialize)]
pub struct MatchItem {
    pub rule: String,
    pub start: u64,
    pub end: u64,
    pub value: String,
}
