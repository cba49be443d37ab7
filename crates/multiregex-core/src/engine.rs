//! 流式扫描引擎（公共入口）
use std::io::Read;

use crate::aggregate::{aggregate, AllMatches, AnyMatch, RangeStream};
use crate::cancel::CancelToken;
use crate::error::ScanError;
use crate::options::StreamOptions;
use crate::ruleset::RuleSet;
use crate::session::Session;
use crate::types::{ScanOutcome, Verdict};
use crate::worker::WorkerMode;

/// 规则集 + 流式参数
///
/// 每次 `scan_*` 调用都是一个独立会话：一个泵线程加每条规则一个 worker 线程，
/// 调用返回前（或 [`RangeStream`] 被丢弃前）全部 join。
/// 源只会被读一次，读到的每一块都会送到每条规则。
#[derive(Debug, Clone, Default)]
pub struct Engine {
    rules: RuleSet,
    options: StreamOptions,
}

impl Engine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules, options: StreamOptions::default() }
    }

    pub fn with_options(rules: RuleSet, options: StreamOptions) -> Self {
        Self { rules, options }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// 任一规则命中即返回 `Matched`，并立即停止泵和其余 worker
    pub fn scan_any<R>(&self, source: R, cancel: &CancelToken) -> Result<ScanOutcome<Verdict>, ScanError>
    where
        R: Read + Send + 'static,
    {
        let session = Session::start(&self.rules, source, self.test_mode(), &self.options, cancel)?;
        Ok(aggregate(session, AnyMatch::default()))
    }

    /// 读完整个流，返回命中的规则（按规则集顺序）
    pub fn scan_all<R>(&self, source: R, cancel: &CancelToken) -> Result<ScanOutcome<RuleSet>, ScanError>
    where
        R: Read + Send + 'static,
    {
        let session = Session::start(&self.rules, source, self.test_mode(), &self.options, cancel)?;
        Ok(aggregate(session, AllMatches::new(self.rules.len())))
    }

    fn test_mode(&self) -> WorkerMode {
        WorkerMode::Test {
            window: self.options.window_size,
            overlap: self.options.overlap,
        }
    }

    /// 按到达顺序惰性产出命中区间
    ///
    /// 跨窗口边界的命中只有长度不超过 `overlap` 时才保证能找到。
    pub fn scan_all_with_ranges<R>(&self, source: R, cancel: &CancelToken) -> Result<RangeStream, ScanError>
    where
        R: Read + Send + 'static,
    {
        let mode = WorkerMode::Extract {
            window: self.options.window_size,
            overlap: self.options.overlap,
        };
        let session = Session::start(&self.rules, source, mode, &self.options, cancel)?;
        Ok(RangeStream::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScanStatus;
    use std::io::{self, Cursor};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const TEXT: &str = "This is a string of text";

    fn engine(patterns: &[&str]) -> Engine {
        Engine::new(RuleSet::from_patterns(patterns).unwrap())
    }

    /// 永不结束的源，持有一个 Arc 以便检查泵是否释放了它
    struct Endless(#[allow(dead_code)] Arc<()>);

    impl Read for Endless {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            buf.fill(b'A');
            Ok(buf.len())
        }
    }

    #[test]
    fn scan_any_matches() {
        let e = engine(&["random text to test for", "string o", "random text to test for three"]);
        let out = e.scan_any(Cursor::new(TEXT), &CancelToken::new()).unwrap();
        assert_eq!(out.value, Verdict::Matched);
        assert!(out.report.status.is_definite());
    }

    #[test]
    fn scan_any_no_match() {
        let e = engine(&["random text to test for", "random text to test for two"]);
        let out = e.scan_any(Cursor::new(TEXT), &CancelToken::new()).unwrap();
        assert_eq!(out.value, Verdict::NotMatched);
        assert_eq!(out.report.status, ScanStatus::Completed);
        assert_eq!(out.report.bytes_read, TEXT.len() as u64);
    }

    #[test]
    fn scan_all_keeps_rule_order() {
        let e = engine(&["text", "nope", "This", "string o"]);
        let out = e.scan_all(Cursor::new(TEXT), &CancelToken::new()).unwrap();
        assert_eq!(out.value.ids(), vec!["text", "This", "string o"]);
    }

    #[test]
    fn empty_rule_set_does_not_read() {
        let e = Engine::new(RuleSet::new());
        let out = e.scan_any(Endless(Arc::new(())), &CancelToken::new()).unwrap();
        assert_eq!(out.value, Verdict::NotMatched);
        assert_eq!(out.report.bytes_read, 0);
    }

    #[test]
    fn scan_any_short_circuits_endless_source() {
        let guard = Arc::new(());
        let e = engine(&["AAAA", "never"]);
        let started = Instant::now();
        let out = e.scan_any(Endless(Arc::clone(&guard)), &CancelToken::new()).unwrap();
        assert_eq!(out.value, Verdict::Matched);
        assert_eq!(out.report.status, ScanStatus::ShortCircuited);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(Arc::strong_count(&guard), 1);
    }

    #[test]
    fn timeout_yields_indeterminate() {
        let opts = StreamOptions { timeout: Some(Duration::from_millis(50)), ..Default::default() };
        let e = Engine::with_options(RuleSet::from_patterns(&["never"]).unwrap(), opts);
        let out = e.scan_any(Endless(Arc::new(())), &CancelToken::new()).unwrap();
        assert_eq!(out.value, Verdict::Indeterminate);
        assert_eq!(out.report.status, ScanStatus::DeadlineExceeded);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let opts = StreamOptions { chunk_size: 0, ..Default::default() };
        let e = Engine::with_options(RuleSet::from_patterns(&["a"]).unwrap(), opts);
        assert!(matches!(
            e.scan_all(Cursor::new("a"), &CancelToken::new()),
            Err(ScanError::InvalidOptions(_))
        ));
    }

    #[test]
    fn ranges_are_absolute_offsets() {
        let e = engine(&["is", "text"]);
        let mut stream = e.scan_all_with_ranges(Cursor::new(TEXT), &CancelToken::new()).unwrap();
        let mut hits: Vec<_> = stream.by_ref().map(|m| (m.rule.id().to_string(), m.range)).collect();
        hits.sort_by_key(|(_, r)| r.start);
        assert_eq!(
            hits,
            vec![("is".into(), 2..4), ("is".into(), 5..7), ("text".into(), 20..24)]
        );
        assert_eq!(stream.finish().status, ScanStatus::Completed);
    }
}
