//! 单条规则：整块测试、区间提取与增量（流式）匹配
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use regex_automata::hybrid::dfa::{Cache, DFA};
use regex_automata::hybrid::LazyStateID;
use regex_automata::nfa::thompson;
use regex_automata::util::syntax;
use regex_automata::Input;
use tracing::debug;

use crate::error::{RuleError, RuleEvalError};

/// 一条不可变的匹配规则
///
/// - `regex`：`regex::bytes` 正则，用于整块测试与区间提取；
/// - `dfa`：同一模式的惰性 DFA，按字节推进，供流式布尔测试使用。
///   惰性 DFA 不支持 Unicode 词边界，这类规则没有 DFA，流式测试改走滑动窗口。
///
/// 规则本身不保存任何扫描状态（DFA 缓存、当前状态都在 [`StreamMatcher`] 里），
/// 因此可以用 `Arc` 在多个引擎、多个线程之间共享。
#[derive(Debug)]
pub struct Rule {
    id: String,
    pattern: String,
    regex: regex::bytes::Regex,
    dfa: Option<DFA>,
}

impl Rule {
    /// 以模式文本本身作为 id
    pub fn new(pattern: &str) -> Result<Self, RuleError> {
        Self::named(pattern, pattern)
    }

    pub fn named(id: &str, pattern: &str) -> Result<Self, RuleError> {
        let regex = regex::bytes::Regex::new(pattern).map_err(|source| RuleError::Regex {
            id: id.to_string(),
            source,
        })?;
        // 与 regex::bytes 保持一致：允许匹配非 UTF-8 字节
        let dfa = DFA::builder()
            .syntax(syntax::Config::new().utf8(false))
            .thompson(thompson::Config::new().utf8(false))
            .build(pattern);
        let dfa = match dfa {
            Ok(dfa) => Some(dfa),
            Err(e) => {
                debug!(rule = id, error = %e, "no incremental matcher, falling back to windowed test");
                None
            }
        };
        Ok(Self {
            id: id.to_string(),
            pattern: pattern.to_string(),
            regex,
            dfa,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 整块测试
    pub fn test(&self, window: &[u8]) -> bool {
        self.regex.is_match(window)
    }

    /// 从 `start` 开始测试；`start` 之前的字节只作为断言上下文
    pub fn test_at(&self, window: &[u8], start: usize) -> bool {
        self.regex.is_match_at(window, start)
    }

    /// 返回窗口内所有非空匹配区间（窗口内偏移）
    pub fn find_all<'a>(&'a self, window: &'a [u8]) -> impl Iterator<Item = Range<usize>> + 'a {
        self.regex
            .find_iter(window)
            .map(|m| m.range())
            .filter(|r| r.end > r.start)
    }

    /// 从 `start` 开始找最左的一个匹配（可能为空）
    pub fn find_at(&self, window: &[u8], start: usize) -> Option<Range<usize>> {
        self.regex.find_at(window, start).map(|m| m.range())
    }

    /// 创建增量匹配器，逐块喂入字节；规则没有惰性 DFA 时返回 `None`
    pub fn stream_matcher(&self) -> Result<Option<StreamMatcher<'_>>, RuleEvalError> {
        let Some(dfa) = &self.dfa else {
            return Ok(None);
        };
        let mut cache = dfa.create_cache();
        let state = dfa
            .start_state_forward(&mut cache, &Input::new(b""))
            .map_err(|e| RuleEvalError(e.to_string()))?;
        Ok(Some(StreamMatcher { dfa, cache, state }))
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.pattern == other.pattern
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.pattern.hash(state);
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// 增量匹配的阶段结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// 已确定匹配
    Matched,
    /// 尚未确定，继续喂数据
    Pending,
    /// 无论后续字节是什么都不可能再匹配
    Impossible,
}

/// 单次扫描内的流式匹配状态（每个 worker 各持一份）
#[derive(Debug)]
pub struct StreamMatcher<'r> {
    dfa: &'r DFA,
    cache: Cache,
    state: LazyStateID,
}

impl StreamMatcher<'_> {
    /// 喂入一块字节
    ///
    /// DFA 的匹配状态会延迟一个字节出现，最后一个字节上的匹配要等 [`Self::finish`]。
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Progress, RuleEvalError> {
        for &b in chunk {
            self.state = self
                .dfa
                .next_state(&mut self.cache, self.state, b)
                .map_err(|e| RuleEvalError(e.to_string()))?;
            if let Some(p) = self.classify()? {
                return Ok(p);
            }
        }
        Ok(Progress::Pending)
    }

    /// 输入结束：走一次 end-of-input 转移，给出最终结论
    pub fn finish(&mut self) -> Result<bool, RuleEvalError> {
        self.state = self
            .dfa
            .next_eoi_state(&mut self.cache, self.state)
            .map_err(|e| RuleEvalError(e.to_string()))?;
        Ok(self.state.is_match())
    }

    fn classify(&self) -> Result<Option<Progress>, RuleEvalError> {
        let sid = self.state;
        if !sid.is_tagged() {
            return Ok(None);
        }
        if sid.is_match() {
            Ok(Some(Progress::Matched))
        } else if sid.is_dead() {
            Ok(Some(Progress::Impossible))
        } else if sid.is_quit() {
            Err(RuleEvalError("streaming matcher entered a quit state".into()))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_match(rule: &Rule, chunks: &[&[u8]]) -> bool {
        let mut m = rule.stream_matcher().unwrap().unwrap();
        for c in chunks {
            match m.feed(c).unwrap() {
                Progress::Matched => return true,
                Progress::Impossible => return false,
                Progress::Pending => {}
            }
        }
        m.finish().unwrap()
    }

    #[test]
    fn streaming_agrees_with_whole_buffer() {
        let rule = Rule::new("string o").unwrap();
        let text = b"This is a string of text";
        assert!(rule.test(text));
        for split in 0..text.len() {
            let (a, b) = text.split_at(split);
            assert!(stream_match(&rule, &[a, b]), "split at {split}");
        }
        assert!(!stream_match(&rule, &[b"string ", b"x"]));
    }

    #[test]
    fn match_on_last_byte_needs_finish() {
        let rule = Rule::new("end$").unwrap();
        let mut m = rule.stream_matcher().unwrap().unwrap();
        assert_eq!(m.feed(b"the end").unwrap(), Progress::Pending);
        assert!(m.finish().unwrap());
    }

    #[test]
    fn anchored_rule_dies_early() {
        let rule = Rule::new("^abc").unwrap();
        let mut m = rule.stream_matcher().unwrap().unwrap();
        assert_eq!(m.feed(b"xabc").unwrap(), Progress::Impossible);
    }

    #[test]
    fn unicode_word_boundary_has_no_incremental_matcher() {
        let rule = Rule::new(r"\bfoo\b").unwrap();
        assert!(rule.stream_matcher().unwrap().is_none());
        assert!(rule.test("é foo".as_bytes()));

        let ascii = Rule::new(r"(?-u:\b)foo(?-u:\b)").unwrap();
        let mut m = ascii.stream_matcher().unwrap().unwrap();
        assert_eq!(m.feed("é foo ".as_bytes()).unwrap(), Progress::Matched);
    }

    #[test]
    fn search_from_offset_keeps_lookbehind() {
        let rule = Rule::new(r"\bfoo").unwrap();
        assert_eq!(rule.find_at(b"xfoo foo", 1), Some(5..8));
        assert!(!rule.test_at(b"xfoo", 1));
        assert!(Rule::new("^x").unwrap().test_at(b"xx", 0));
        assert!(!Rule::new("^x").unwrap().test_at(b"xx", 1));
    }

    #[test]
    fn find_all_skips_empty_matches() {
        let rule = Rule::new("a*").unwrap();
        let ranges: Vec<_> = rule.find_all(b"baab").collect();
        assert_eq!(ranges, vec![1..3]);
    }

    #[test]
    fn identity_is_id_and_pattern() {
        let a = Rule::named("x", "abc").unwrap();
        let b = Rule::named("x", "abc").unwrap();
        let c = Rule::named("y", "abc").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(Rule::new("abc").unwrap().to_string(), "abc");
    }
}
