//! 多规则正则匹配库
//!
//! 设计要点：
//! - 一个源只读一次：泵把每块数据复制到每条规则各自的有界子流，最慢的规则决定节奏。
//! - 每条规则一个 worker 线程；会话结束前（返回或丢弃结果流之前）全部 join，不残留线程。
//! - "任一匹配"先到先得并立即取消其余工作；"全部匹配"读完整个流，按规则顺序输出。
//! - 所有阻塞收发都与取消令牌一起 select，取消在一个块周期内生效。
//! - 内存内的 `RuleSet::matches*` 是顺序扫描，不涉及线程。

mod aggregate;
mod cancel;
pub mod catalog;
mod engine;
mod error;
mod findings;
pub mod mux;
mod options;
mod ring;
mod rule;
mod rules;
mod ruleset;
mod scan;
mod session;
mod types;
mod worker;

pub use aggregate::RangeStream;
pub use cancel::CancelToken;
pub use engine::Engine;
pub use error::{Canceled, ConfigError, RuleError, RuleEvalError, ScanError};
pub use options::{ScanMode, ScanOptions, ScanStats, StreamOptions};
pub use rule::{Progress, Rule, StreamMatcher};
pub use rules::{catalog_rules, load_rule_file, RuleFile};
pub use ruleset::{RuleMatch, RuleSet};
pub use scan::{build_engine, scan_and_write, scan_reader};
pub use types::{FileReport, MatchItem, RuleDiagnostic, ScanOutcome, ScanReport, ScanStatus, Verdict};
