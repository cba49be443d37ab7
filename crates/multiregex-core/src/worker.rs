//! 规则 worker：独占一个子流，给出该规则的结论
use std::sync::Arc;

use crossbeam_channel::{select, Sender};
use tracing::trace;

use crate::cancel::CancelToken;
use crate::mux::SubStream;
use crate::ring::{RingWindow, WindowHit};
use crate::error::RuleEvalError;
use crate::rule::{Progress, Rule, StreamMatcher};
use crate::types::RuleDiagnostic;

/// worker 的匹配策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerMode {
    /// 整流布尔测试：有惰性 DFA 时逐字节推进，否则按窗口整块测试
    Test { window: usize, overlap: usize },
    /// 环形窗口提取命中区间
    Extract { window: usize, overlap: usize },
}

/// 某条规则的结论；每个 worker 每次会话最多发一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MatchSignal {
    pub(crate) index: usize,
    pub(crate) matched: bool,
}

/// worker → 聚合器的事件
#[derive(Debug)]
pub(crate) enum Event {
    Signal(MatchSignal),
    Hit { index: usize, hit: WindowHit },
    Failed(RuleDiagnostic),
}

pub(crate) struct Worker {
    index: usize,
    rule: Arc<Rule>,
    stream: SubStream,
    events: Sender<Event>,
    cancel: CancelToken,
}

impl Worker {
    pub(crate) fn new(
        index: usize,
        rule: Arc<Rule>,
        stream: SubStream,
        events: Sender<Event>,
        cancel: CancelToken,
    ) -> Self {
        Self { index, rule, stream, events, cancel }
    }

    /// 运行到出结论、流结束或会话取消；取消时什么都不发
    pub(crate) fn run(mut self, mode: WorkerMode) {
        let result = match mode {
            WorkerMode::Test { window, overlap } => self.run_test(window, overlap),
            WorkerMode::Extract { window, overlap } => Ok(self.run_extract(window, overlap)),
        };
        match result {
            Ok(Some(matched)) => {
                trace!(rule = self.rule.id(), matched, "rule decided");
                self.emit(Event::Signal(MatchSignal { index: self.index, matched }));
            }
            Ok(None) => trace!(rule = self.rule.id(), "rule canceled"),
            Err(e) => {
                self.emit(Event::Failed(RuleDiagnostic {
                    index: self.index,
                    rule_id: self.rule.id().to_string(),
                    message: e.to_string(),
                }));
            }
        }
    }

    fn run_test(&mut self, window: usize, overlap: usize) -> Result<Option<bool>, RuleEvalError> {
        let rule = Arc::clone(&self.rule);
        match rule.stream_matcher()? {
            Some(matcher) => self.test_incremental(matcher),
            None => Ok(self.test_windowed(&rule, window, overlap)),
        }
    }

    fn test_incremental(&mut self, mut matcher: StreamMatcher<'_>) -> Result<Option<bool>, RuleEvalError> {
        loop {
            let chunk = match self.stream.next_chunk() {
                Ok(Some(c)) => c,
                Ok(None) => return matcher.finish().map(Some),
                Err(_) => return Ok(None),
            };
            match matcher.feed(&chunk)? {
                Progress::Matched => return Ok(Some(true)),
                Progress::Impossible => return Ok(Some(false)),
                Progress::Pending => {}
            }
        }
    }

    fn test_windowed(&mut self, rule: &Rule, window: usize, overlap: usize) -> Option<bool> {
        let mut ring = RingWindow::new(window, overlap);
        loop {
            match self.stream.next_chunk() {
                Ok(Some(c)) => {
                    if ring.push_test(&c, rule) {
                        return Some(true);
                    }
                }
                Ok(None) => return Some(ring.finish_test(rule)),
                Err(_) => return None,
            }
        }
    }

    fn run_extract(&mut self, window: usize, overlap: usize) -> Option<bool> {
        let mut ring = RingWindow::new(window, overlap);
        let mut hits = Vec::new();
        let mut matched = false;
        loop {
            let done = match self.stream.next_chunk() {
                Ok(Some(c)) => {
                    ring.push(&c, &self.rule, &mut hits);
                    false
                }
                Ok(None) => {
                    ring.finish(&self.rule, &mut hits);
                    true
                }
                Err(_) => return None,
            };
            for hit in hits.drain(..) {
                matched = true;
                if !self.emit(Event::Hit { index: self.index, hit }) {
                    return None;
                }
            }
            if done {
                return Some(matched);
            }
        }
    }

    /// 可取消的发送；聚合器已离开或会话取消时返回 false
    fn emit(&self, event: Event) -> bool {
        select! {
            send(self.events, event) -> res => res.is_ok(),
            recv(self.cancel.cancelled()) -> _ => false,
        }
    }
}
