//! 结果聚合：同一套会话，按策略决定何时停止、如何给出结果
use std::sync::Arc;

use crate::ruleset::{RuleMatch, RuleSet};
use crate::session::{End, Next, Session};
use crate::types::{RuleDiagnostic, ScanOutcome, ScanReport, Verdict};
use crate::worker::{Event, MatchSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// 已有结论，立即取消会话
    Stop,
}

/// 聚合策略：短路判定 + 结束时的结果构造
pub(crate) trait Policy {
    type Output;

    fn observe(&mut self, signal: MatchSignal) -> Flow;

    fn finish(self, rules: &RuleSet, end: End) -> Self::Output;
}

/// 任一匹配：第一个命中即停止（先到先得）
#[derive(Debug, Default)]
pub(crate) struct AnyMatch {
    matched: bool,
}

impl Policy for AnyMatch {
    type Output = Verdict;

    fn observe(&mut self, signal: MatchSignal) -> Flow {
        if signal.matched {
            self.matched = true;
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn finish(self, _rules: &RuleSet, end: End) -> Verdict {
        match (self.matched, end) {
            (true, _) => Verdict::Matched,
            (false, End::Canceled | End::DeadlineExceeded) => Verdict::Indeterminate,
            (false, _) => Verdict::NotMatched,
        }
    }
}

/// 全部匹配：等所有 worker 报告；输出按规则插入顺序，与到达顺序无关
#[derive(Debug)]
pub(crate) struct AllMatches {
    matched: Vec<bool>,
}

impl AllMatches {
    pub(crate) fn new(n: usize) -> Self {
        Self { matched: vec![false; n] }
    }
}

impl Policy for AllMatches {
    type Output = RuleSet;

    fn observe(&mut self, signal: MatchSignal) -> Flow {
        if let Some(slot) = self.matched.get_mut(signal.index) {
            *slot |= signal.matched;
        }
        Flow::Continue
    }

    fn finish(self, rules: &RuleSet, _end: End) -> RuleSet {
        rules
            .iter()
            .zip(self.matched)
            .filter_map(|(rule, hit)| hit.then(|| Arc::clone(rule)))
            .collect()
    }
}

/// 驱动会话直到策略给出结论、全部 worker 结束、取消或超时
pub(crate) fn aggregate<P: Policy>(mut session: Session, mut policy: P) -> ScanOutcome<P::Output> {
    let mut diagnostics = Vec::new();
    let end = loop {
        match session.next() {
            Next::Event(Event::Signal(signal)) => {
                if policy.observe(signal) == Flow::Stop {
                    break End::ShortCircuited;
                }
            }
            Next::Event(Event::Failed(d)) => diagnostics.push(d),
            Next::Event(Event::Hit { .. }) => {}
            Next::Drained => break End::Drained,
            Next::Canceled => break End::Canceled,
            Next::DeadlineExceeded => break End::DeadlineExceeded,
        }
    };
    let report = session.conclude(end, diagnostics);
    let value = policy.finish(&session.rules, end);
    ScanOutcome { value, report }
}

/// 惰性、有限、不可重启的命中序列（按到达顺序）
///
/// 丢弃或调用 [`RangeStream::finish`] 都会取消并回收会话中的所有线程。
pub struct RangeStream {
    session: Session,
    diagnostics: Vec<RuleDiagnostic>,
    end: Option<End>,
}

impl RangeStream {
    pub(crate) fn new(session: Session) -> Self {
        Self { session, diagnostics: Vec::new(), end: None }
    }

    /// 停止生产并返回报告；序列未耗尽时状态为 `Canceled`
    pub fn finish(mut self) -> ScanReport {
        let end = self.end.unwrap_or(End::Canceled);
        let diagnostics = std::mem::take(&mut self.diagnostics);
        self.session.conclude(end, diagnostics)
    }
}

impl Iterator for RangeStream {
    type Item = RuleMatch;

    fn next(&mut self) -> Option<RuleMatch> {
        if self.end.is_some() {
            return None;
        }
        loop {
            match self.session.next() {
                Next::Event(Event::Hit { index, hit }) => {
                    let rule = self.session.rules.get(index)?;
                    return Some(RuleMatch {
                        rule: Arc::clone(rule),
                        range: hit.range,
                        bytes: hit.bytes,
                    });
                }
                Next::Event(Event::Signal(_)) => {}
                Next::Event(Event::Failed(d)) => self.diagnostics.push(d),
                Next::Drained => {
                    self.end = Some(End::Drained);
                    return None;
                }
                Next::Canceled => {
                    self.end = Some(End::Canceled);
                    return None;
                }
                Next::DeadlineExceeded => {
                    self.end = Some(End::DeadlineExceeded);
                    return None;
                }
            }
        }
    }
}
