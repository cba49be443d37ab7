//! 扫描会话：泵 + N 个 worker 的结构化生命周期
//!
//! 会话创建时派生调用方令牌的子令牌，所有线程都挂在它上面；
//! `shutdown`（以及 `Drop`）先取消再 join 全部线程，会话结束后不会有线程残留。
use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{select, Receiver};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::ScanError;
use crate::mux::{self, PumpEnd, PumpReport};
use crate::options::StreamOptions;
use crate::ruleset::RuleSet;
use crate::types::{RuleDiagnostic, ScanReport, ScanStatus};
use crate::worker::{Event, Worker, WorkerMode};

/// 聚合器一次等待的结果
#[derive(Debug)]
pub(crate) enum Next {
    Event(Event),
    /// 所有 worker 都已退出且事件已取完
    Drained,
    Canceled,
    DeadlineExceeded,
}

/// 会话如何结束（由聚合器决定）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum End {
    Drained,
    ShortCircuited,
    Canceled,
    DeadlineExceeded,
}

pub(crate) struct Session {
    pub(crate) rules: RuleSet,
    cancel: CancelToken,
    events: Receiver<Event>,
    deadline: Receiver<Instant>,
    pump: Option<JoinHandle<PumpReport>>,
    workers: Vec<(usize, JoinHandle<()>)>,
}

impl Session {
    pub(crate) fn start<R: Read + Send + 'static>(
        rules: &RuleSet,
        source: R,
        mode: WorkerMode,
        opts: &StreamOptions,
        caller: &CancelToken,
    ) -> Result<Self, ScanError> {
        opts.validate()?;
        let n = rules.len();
        let cancel = caller.child_token();
        let (tx, rx) = crossbeam_channel::bounded(n + opts.queue_depth);
        let deadline = match opts.timeout {
            Some(t) => crossbeam_channel::after(t),
            None => crossbeam_channel::never(),
        };
        let mut session = Session {
            rules: rules.clone(),
            cancel,
            events: rx,
            deadline,
            pump: None,
            workers: Vec::with_capacity(n),
        };
        debug!(rules = n, ?mode, "scan session started");
        if n == 0 {
            return Ok(session);
        }

        // 中途 spawn 失败时，已启动的线程由 Session 的 Drop 负责回收
        let (pump, streams) =
            mux::fan_out(source, n, opts.chunk_size, opts.queue_depth, &session.cancel);
        for (index, (rule, stream)) in rules.iter().zip(streams).enumerate() {
            let worker = Worker::new(
                index,
                std::sync::Arc::clone(rule),
                stream,
                tx.clone(),
                session.cancel.clone(),
            );
            let handle = thread::Builder::new()
                .name(format!("multiregex-worker-{index}"))
                .spawn(move || worker.run(mode))?;
            session.workers.push((index, handle));
        }
        drop(tx);
        let handle = thread::Builder::new()
            .name("multiregex-pump".into())
            .spawn(move || pump.run())?;
        session.pump = Some(handle);
        Ok(session)
    }

    /// 等待下一个事件、取消或超时
    pub(crate) fn next(&self) -> Next {
        // 会话令牌在 shutdown 之前只会因调用方取消而触发；取消优先于其它就绪事件
        if self.cancel.is_cancelled() {
            return Next::Canceled;
        }
        select! {
            recv(self.events) -> ev => match ev {
                Ok(ev) => Next::Event(ev),
                Err(_) if self.cancel.is_cancelled() => Next::Canceled,
                Err(_) => Next::Drained,
            },
            recv(self.cancel.cancelled()) -> _ => Next::Canceled,
            recv(self.deadline) -> _ => Next::DeadlineExceeded,
        }
    }

    /// 取消并 join 所有线程，根据结束方式生成报告
    pub(crate) fn conclude(&mut self, end: End, mut diagnostics: Vec<RuleDiagnostic>) -> ScanReport {
        let pump = self.shutdown(&mut diagnostics);
        let bytes_read = pump.as_ref().map_or(0, |p| p.bytes_read);
        let status = match end {
            End::ShortCircuited => ScanStatus::ShortCircuited,
            End::Canceled => ScanStatus::Canceled,
            End::DeadlineExceeded => ScanStatus::DeadlineExceeded,
            End::Drained => match pump.map(|p| p.end) {
                Some(PumpEnd::ReadFailed(e)) => ScanStatus::SourceFailed {
                    kind: e.kind(),
                    message: e.to_string(),
                },
                _ => ScanStatus::Completed,
            },
        };
        for d in &diagnostics {
            warn!(rule = d.rule_id.as_str(), message = d.message.as_str(), "rule evaluation failed");
        }
        debug!(status = status.as_str(), bytes_read, "scan session finished");
        ScanReport { status, bytes_read, diagnostics }
    }

    fn shutdown(&mut self, diagnostics: &mut Vec<RuleDiagnostic>) -> Option<PumpReport> {
        self.cancel.cancel();
        let pump = self.pump.take().and_then(|h| h.join().ok());
        for (index, handle) in self.workers.drain(..) {
            if handle.join().is_err() {
                diagnostics.push(RuleDiagnostic {
                    index,
                    rule_id: self.rules.get(index).map(|r| r.id().to_string()).unwrap_or_default(),
                    message: "rule worker panicked".into(),
                });
            }
        }
        pump
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let mut ignored = Vec::new();
        self.shutdown(&mut ignored);
    }
}
