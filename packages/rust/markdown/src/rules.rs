//! Generic weighted-rule interpreter.
//!
//! Heuristic tables (language signals, admonition keywords) are plain data:
//! ordered `(label, pattern, weight)` triples compiled once into a
//! [`RuleTable`]. Every detector evaluates its table through the same two
//! scoring modes, so tables can be tuned and tested independently of the
//! code that consumes them.

use regex::Regex;

/// One compiled `(predicate, weight)` pair.
#[derive(Debug)]
pub struct WeightedRule {
    /// Short human-readable description used in suggestion reasons.
    pub label: &'static str,
    pub weight: f64,
    pattern: Regex,
}

impl WeightedRule {
    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// An ordered list of weighted rules.
#[derive(Debug, Default)]
pub struct RuleTable {
    rules: Vec<WeightedRule>,
}

impl RuleTable {
    /// Compile a table of `(label, pattern, weight)` triples.
    ///
    /// Tables are static data checked by unit tests, so an invalid pattern is
    /// a programming error.
    pub fn compile(spec: &[(&'static str, &'static str, f64)]) -> Self {
        let rules = spec
            .iter()
            .map(|&(label, pattern, weight)| WeightedRule {
                label,
                weight,
                pattern: Regex::new(pattern).expect("valid regex"),
            })
            .collect();
        Self { rules }
    }

    /// Compile a table where every pattern carries weight 1 and is its own label.
    pub fn uniform(patterns: &[&'static str]) -> Self {
        let rules = patterns
            .iter()
            .map(|&pattern| WeightedRule {
                label: pattern,
                weight: 1.0,
                pattern: Regex::new(pattern).expect("valid regex"),
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose pattern matches `text`, in table order.
    pub fn matching<'a, 't>(&'a self, text: &'t str) -> impl Iterator<Item = &'a WeightedRule> {
        self.rules.iter().filter(move |rule| rule.is_match(text))
    }

    /// Highest-weight matching rule. Earlier rules win ties.
    pub fn strongest(&self, text: &str) -> Option<&WeightedRule> {
        self.matching(text).fold(None, |best: Option<&WeightedRule>, rule| match best {
            Some(b) if b.weight >= rule.weight => Some(b),
            _ => Some(rule),
        })
    }

    /// Fraction of rules that match `text`, in `[0, 1]`.
    pub fn matched_fraction(&self, text: &str) -> f64 {
        if self.rules.is_empty() {
            return 0.0;
        }
        self.matching(text).count() as f64 / self.rules.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RuleTable {
        RuleTable::compile(&[
            ("mentions cat", r"(?i)\bcat\b", 0.4),
            ("mentions dog", r"(?i)\bdog\b", 0.8),
            ("mentions pet", r"(?i)\bpet\b", 0.8),
        ])
    }

    #[test]
    fn strongest_takes_max_not_sum() {
        let rules = table();
        let best = rules.strongest("My cat and my dog").expect("match");
        assert_eq!(best.label, "mentions dog");
        assert_eq!(best.weight, 0.8);
    }

    #[test]
    fn strongest_prefers_earlier_rule_on_tie() {
        let rules = table();
        let best = rules.strongest("a dog is a pet").expect("match");
        assert_eq!(best.label, "mentions dog");
    }

    #[test]
    fn strongest_none_without_match() {
        assert!(table().strongest("a goldfish").is_none());
    }

    #[test]
    fn matched_fraction_counts_rules() {
        let rules = table();
        assert_eq!(rules.matched_fraction("cat"), 1.0 / 3.0);
        assert_eq!(rules.matched_fraction("cat dog pet"), 1.0);
        assert_eq!(RuleTable::default().matched_fraction("anything"), 0.0);
    }

    #[test]
    fn uniform_rules_weigh_one() {
        let rules = RuleTable::uniform(&[r"\bfn\b", r"\blet\b"]);
        assert_eq!(rules.len(), 2);
        assert!(rules.matching("let x").all(|r| r.weight == 1.0));
    }
}
