//! 提取结果排序（批量输出使用）
use crate::types::MatchItem;

/// 对单文件命中进行稳定排序：起始偏移升序 → 长度降序 → 规则 id 字典序升序
pub(crate) fn sort_matches_stable(matches: &mut [MatchItem]) {
    matches.sort_by(|a, b| {
        use std::cmp::Ordering;
        match a.start.cmp(&b.start) {
            Ordering::Equal => match (b.end - b.start).cmp(&(a.end - a.start)) {
                Ordering::Equal => a.rule.cmp(&b.rule),
                o => o,
            },
            o => o,
        }
    });
}
