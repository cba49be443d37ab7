//! 规则集合与内存内（非流式）匹配
use std::ops::Range;
use std::sync::Arc;

use crate::error::RuleError;
use crate::rule::Rule;

/// 有序规则集合
///
/// 顺序只影响"全部匹配"模式下的输出顺序；克隆只复制 `Arc`。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Arc<Rule>>,
}

/// 一次命中：规则、在输入中的绝对字节区间、命中的字节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule: Arc<Rule>,
    pub range: Range<u64>,
    pub bytes: Vec<u8>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 逐条编译模式文本，模式本身即 id
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, RuleError> {
        patterns
            .iter()
            .map(|p| Rule::new(p.as_ref()).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()
            .map(|rules| Self { rules })
    }

    pub fn push(&mut self, rule: Arc<Rule>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Rule>> {
        self.rules.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Rule>> {
        self.rules.iter()
    }

    pub fn contains(&self, rule: &Rule) -> bool {
        self.rules.iter().any(|r| **r == *rule)
    }

    /// 规则 id 列表（按插入顺序）
    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// 任一规则命中即返回 true
    pub fn matches_any(&self, data: &[u8]) -> bool {
        self.rules.iter().any(|r| r.test(data))
    }

    /// 返回所有命中的规则（保持插入顺序）
    pub fn matches(&self, data: &[u8]) -> RuleSet {
        self.rules.iter().filter(|r| r.test(data)).cloned().collect()
    }

    /// 按规则顺序提取所有命中片段
    pub fn matched_data(&self, data: &[u8]) -> Vec<RuleMatch> {
        let mut out = Vec::new();
        for rule in &self.rules {
            for r in rule.find_all(data) {
                out.push(RuleMatch {
                    rule: Arc::clone(rule),
                    range: r.start as u64..r.end as u64,
                    bytes: data[r].to_vec(),
                });
            }
        }
        out
    }
}

impl FromIterator<Arc<Rule>> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Arc<Rule>>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for RuleSet {
    type Item = Arc<Rule>;
    type IntoIter = std::vec::IntoIter<Arc<Rule>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.into_iter()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Arc<Rule>;
    type IntoIter = std::slice::Iter<'a, Arc<Rule>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl Extend<Arc<Rule>> for RuleSet {
    fn extend<I: IntoIterator<Item = Arc<Rule>>>(&mut self, iter: I) {
        self.rules.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &[u8] = b"This is a string of text";

    #[test]
    fn matches_single_rule() {
        let rules = RuleSet::from_patterns(&[
            "random text to test for",
            "random text to test for two",
            "string o",
            "random text to test for three",
        ])
        .unwrap();
        let matched = rules.matches(TEXT);
        assert_eq!(matched.ids(), vec!["string o"]);
        assert!(rules.matches_any(TEXT));
    }

    #[test]
    fn no_rule_matches() {
        let rules =
            RuleSet::from_patterns(&["random text to test for", "random text to test for two"])
                .unwrap();
        assert!(rules.matches(TEXT).is_empty());
        assert!(!rules.matches_any(TEXT));
    }

    #[test]
    fn any_iff_nonempty() {
        let inputs: [&[u8]; 4] = [b"", b"abc", b"xyz 123", b"CVE-2021-44228"];
        let rules = RuleSet::from_patterns(&["b", "[0-9]{3}", r"CVE-\d{4}-\d{4,7}"]).unwrap();
        for input in inputs {
            assert_eq!(rules.matches_any(input), !rules.matches(input).is_empty());
        }
    }

    #[test]
    fn matched_data_in_rule_order() {
        let rules = RuleSet::from_patterns(&["o", "is"]).unwrap();
        let found = rules.matched_data(TEXT);
        let values: Vec<_> = found.iter().map(|m| m.bytes.as_slice()).collect();
        assert_eq!(values, vec![&b"o"[..], b"is", b"is"]);
        assert_eq!(found[1].range, 2..4);
    }
}
