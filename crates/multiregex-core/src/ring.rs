//! 滑动窗口（带重叠），用于提取以及没有惰性 DFA 的规则的布尔测试
//!
//! 窗口攒满 W 字节（或输入结束）时从记录的续扫位置开始搜索，然后保留末尾
//! O 字节（外加几个字节的断言上下文）作为下一窗口的开头。
//! 跨窗口边界的命中只有长度不超过 O 时才保证被找到。
use crate::rule::Rule;
use std::ops::Range;

/// 滑动时在重叠区之前多保留的字节数，只给 `\b`、`^` 这类零宽断言当向后看的上下文
const LOOKBEHIND: usize = 4;

/// 单次提取得到的命中（绝对偏移 + 字节）
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WindowHit {
    pub(crate) range: Range<u64>,
    pub(crate) bytes: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct RingWindow {
    buf: Vec<u8>,
    capacity: usize,
    overlap: usize,
    /// buf[0] 在整个流中的偏移
    base: u64,
    /// 下一次搜索的起点（流偏移）：上一个命中的结束处、被推迟命中的起点，
    /// 或者上一窗口重叠区的开头
    resume: u64,
}

impl RingWindow {
    /// 调用方保证 `overlap < capacity`（见 `StreamOptions::validate`）
    pub(crate) fn new(capacity: usize, overlap: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            overlap: overlap.min(capacity - 1),
            base: 0,
            resume: 0,
        }
    }

    /// 追加字节；每攒满一个窗口就提取一次，新命中追加到 `out`
    pub(crate) fn push(&mut self, mut data: &[u8], rule: &Rule, out: &mut Vec<WindowHit>) {
        while !data.is_empty() {
            data = self.fill(data);
            if self.buf.len() == self.capacity {
                self.extract(rule, out, false);
                self.slide();
            }
        }
    }

    /// 输入结束：扫描尚未覆盖的尾部
    pub(crate) fn finish(&mut self, rule: &Rule, out: &mut Vec<WindowHit>) {
        if self.pending() {
            self.extract(rule, out, true);
        }
    }

    /// 布尔测试版本的 [`Self::push`]：任一窗口命中即返回 true
    pub(crate) fn push_test(&mut self, mut data: &[u8], rule: &Rule) -> bool {
        while !data.is_empty() {
            data = self.fill(data);
            if self.buf.len() == self.capacity {
                if self.test(rule) {
                    return true;
                }
                self.slide();
            }
        }
        false
    }

    /// 布尔测试版本的 [`Self::finish`]；空输入与整块测试空串一致
    pub(crate) fn finish_test(&mut self, rule: &Rule) -> bool {
        let empty = self.base == 0 && self.buf.is_empty();
        (self.pending() || empty) && self.test(rule)
    }

    fn fill<'d>(&mut self, data: &'d [u8]) -> &'d [u8] {
        let take = (self.capacity - self.buf.len()).min(data.len());
        self.buf.extend_from_slice(&data[..take]);
        &data[take..]
    }

    fn pending(&self) -> bool {
        self.base + self.buf.len() as u64 > self.resume
    }

    /// buf 内的搜索起点；之前的字节只作为断言上下文
    fn search_start(&self) -> usize {
        (self.resume.saturating_sub(self.base) as usize).min(self.buf.len())
    }

    /// 下一窗口至少从本窗口重叠区的开头搜起
    fn advance_to_overlap(&mut self) {
        let tail = self.base + (self.buf.len() - self.overlap.min(self.buf.len())) as u64;
        self.resume = self.resume.max(tail);
    }

    fn test(&mut self, rule: &Rule) -> bool {
        let hit = rule.test_at(&self.buf, self.search_start());
        self.advance_to_overlap();
        hit
    }

    fn extract(&mut self, rule: &Rule, out: &mut Vec<WindowHit>, last: bool) {
        let len = self.buf.len();
        let mut pos = self.search_start();
        while pos <= len {
            let Some(r) = rule.find_at(&self.buf, pos) else { break };
            if r.is_empty() {
                pos = r.end + 1;
                continue;
            }
            // 贴着窗口末尾的命中可能被截断；能放进重叠区的留给下一窗口从它的起点重搜
            if !last && r.end == len && r.start >= len - self.overlap {
                self.resume = self.base + r.start as u64;
                return;
            }
            pos = r.end;
            self.resume = self.base + r.end as u64;
            out.push(WindowHit {
                range: self.base + r.start as u64..self.resume,
                bytes: self.buf[r].to_vec(),
            });
        }
        self.advance_to_overlap();
    }

    fn slide(&mut self) {
        let keep = (self.overlap + LOOKBEHIND).min(self.capacity - 1).min(self.buf.len());
        let drop = self.buf.len() - keep;
        self.buf.copy_within(drop.., 0);
        self.buf.truncate(keep);
        self.base += drop as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(rule: &Rule, input: &[u8], chunk: usize, w: usize, o: usize) -> Vec<WindowHit> {
        let mut win = RingWindow::new(w, o);
        let mut out = Vec::new();
        for c in input.chunks(chunk) {
            win.push(c, rule, &mut out);
        }
        win.finish(rule, &mut out);
        out
    }

    #[test]
    fn finds_match_straddling_windows() {
        let rule = Rule::new("matchme").unwrap();
        let mut input = vec![b'A'; 10_240];
        input.extend_from_slice(b"matchme!");
        let hits = extract(&rule, &input, 1024, 16, 8);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].range, 10_240..10_247);
        assert_eq!(hits[0].bytes, b"matchme");
    }

    #[test]
    fn overlap_does_not_duplicate_hits() {
        let rule = Rule::new("ab").unwrap();
        let input = b"ab..ab..ab..ab..ab";
        for chunk in 1..input.len() {
            let hits = extract(&rule, input, chunk, 6, 3);
            let starts: Vec<_> = hits.iter().map(|h| h.range.start).collect();
            assert_eq!(starts, vec![0, 4, 8, 12, 16], "chunk {chunk}");
        }
    }

    #[test]
    fn agrees_with_whole_buffer_for_short_matches() {
        let rule = Rule::new("[0-9]{2,4}").unwrap();
        let input = b"x12 yy 3456 z 7 88 99999 q";
        let whole: Vec<_> = rule.find_all(input).map(|r| r.start as u64..r.end as u64).collect();
        let hits: Vec<_> = extract(&rule, input, 5, 12, 5).into_iter().map(|h| h.range).collect();
        assert_eq!(hits, whole);
    }

    #[test]
    fn defers_match_touching_window_end() {
        let rule = Rule::new("[0-9]+").unwrap();
        let hits = extract(&rule, b"xxxxx1234 yy", 3, 8, 4);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].bytes, b"1234");
        assert_eq!(hits[0].range, 5..9);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let rule = Rule::new(".*").unwrap();
        assert!(extract(&rule, b"", 4, 8, 2).is_empty());
    }

    fn whole(rule: &Rule, input: &[u8]) -> Vec<Range<u64>> {
        rule.find_all(input).map(|r| r.start as u64..r.end as u64).collect()
    }

    fn ranges(hits: Vec<WindowHit>) -> Vec<Range<u64>> {
        hits.into_iter().map(|h| h.range).collect()
    }

    #[test]
    fn overlap_starting_inside_emitted_match() {
        let rule = Rule::new("[a-z]{2}").unwrap();
        let input = b"0000abcdef111";
        assert_eq!(ranges(extract(&rule, input, 4, 8, 3)), vec![4..6, 6..8, 8..10]);
    }

    #[test]
    fn window_geometry_sweep_matches_whole_buffer() {
        let input = b"0000abcdef111 zz9 x12345 ab7cd 88 q 0000abcdef111 zz9 x12345 ab7cd 88 q";
        for pattern in ["[a-z]{2}", "[0-9]{1,3}", "[0-9][a-z]?"] {
            let rule = Rule::new(pattern).unwrap();
            let expected = whole(&rule, input);
            for w in 4..=12 {
                for o in 3..w {
                    for chunk in [1, 2, 5, 64] {
                        let got = ranges(extract(&rule, input, chunk, w, o));
                        assert_eq!(got, expected, "{pattern} w={w} o={o} chunk={chunk}");
                    }
                }
            }
        }
    }

    #[test]
    fn lookbehind_context_survives_slide() {
        let rule = Rule::new(r"\bfoo\b").unwrap();
        let input = "é xfoo foo, café foo".as_bytes();
        let expected = whole(&rule, input);
        assert_eq!(expected.len(), 2);
        for w in 10..=16 {
            assert_eq!(ranges(extract(&rule, input, 3, w, 5)), expected, "w={w}");
        }
    }

    #[test]
    fn windowed_test_agrees_with_whole_buffer() {
        let test = |pattern: &str, input: &[u8], w: usize, o: usize| {
            let rule = Rule::new(pattern).unwrap();
            let mut win = RingWindow::new(w, o);
            for c in input.chunks(3) {
                if win.push_test(c, &rule) {
                    return true;
                }
            }
            win.finish_test(&rule)
        };
        let text = "é foo and some more text after".as_bytes();
        assert!(test(r"\bfoo\b", text, 8, 4));
        assert!(!test(r"\bfoo\b", "é xfoo yfooz".as_bytes(), 8, 4));
        assert!(test("after$", text, 8, 6));
        assert!(test("a*", b"", 8, 4));
        assert!(!test("z", b"", 8, 4));
    }
}
