//! Venue-name classification into memorial hall codes
//!
//! The schedule's location column is free text typed by staff. Most rows name a
//! hall exactly, some carry historical names or a sub-unit suffix, and the
//! 和平堂 rooms are numbered and grouped into coded ranges.

use regex::Regex;
use tracing::trace;

/// Prefix of the numbered 和平堂 rooms ("和平堂-53-1")
pub const HEPING_PREFIX: &str = "和平堂";

/// One accepted suffix of a numbered-room range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeMember {
    Number(u32),
    /// Literal suffix that must not be read as a number ("53-1")
    Token(String),
}

impl RangeMember {
    fn accepts(&self, token: &str) -> bool {
        match self {
            RangeMember::Token(t) => t == token,
            RangeMember::Number(n) => {
                !token.is_empty()
                    && token.bytes().all(|b| b.is_ascii_digit())
                    && token.parse::<u32>().ok() == Some(*n)
            }
        }
    }
}

/// Match strategy for a single venue rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    /// Whole cleaned string equals the name
    Exact(String),
    /// Cleaned string contains `token`, or equals one of `aliases`
    Substring { token: String, aliases: Vec<String> },
    /// Cleaned string starts with `prefix` followed by `-`
    PrefixPattern(String),
    /// Cleaned string is `prefix-<suffix>` and the suffix is one of `members`
    RangeMembership {
        prefix: String,
        members: Vec<RangeMember>,
    },
}

impl MatchRule {
    pub fn matches(&self, cleaned: &str) -> bool {
        match self {
            MatchRule::Exact(name) => cleaned == name,
            MatchRule::Substring { token, aliases } => {
                cleaned.contains(token.as_str()) || aliases.iter().any(|a| a == cleaned)
            }
            MatchRule::PrefixPattern(prefix) => cleaned
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('-')),
            MatchRule::RangeMembership { prefix, members } => {
                match range_suffix(cleaned, prefix) {
                    Some(suffix) => members.iter().any(|m| m.accepts(suffix)),
                    None => false,
                }
            }
        }
    }
}

/// `^{prefix}-(.+)$`, without crossing a line break
fn range_suffix<'a>(cleaned: &'a str, prefix: &str) -> Option<&'a str> {
    let suffix = cleaned.strip_prefix(prefix)?.strip_prefix('-')?;
    if suffix.is_empty() || suffix.contains('\n') {
        None
    } else {
        Some(suffix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueRule {
    pub code: String,
    pub label: String,
    pub matchers: Vec<MatchRule>,
}

impl VenueRule {
    /// Rule matching the hall's name exactly
    pub fn exact(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            label: name.to_string(),
            matchers: vec![MatchRule::Exact(name.to_string())],
        }
    }

    /// Rule for a numbered 和平堂 room range
    pub fn range(code: &str, label: &str, members: Vec<RangeMember>) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
            matchers: vec![MatchRule::RangeMembership {
                prefix: HEPING_PREFIX.to_string(),
                members,
            }],
        }
    }

    pub fn or(mut self, matcher: MatchRule) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn matches(&self, cleaned: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(cleaned))
    }
}

fn numbers(range: std::ops::RangeInclusive<u32>) -> Vec<RangeMember> {
    range.map(RangeMember::Number).collect()
}

/// Maps a raw location to a venue code. Rules are tried in table order and the
/// first match wins.
#[derive(Debug, Clone)]
pub struct VenueClassifier {
    rules: Vec<VenueRule>,
    notes: Regex,
}

impl VenueClassifier {
    pub fn new(rules: Vec<VenueRule>) -> Self {
        Self {
            rules,
            notes: Regex::new("（.*?）").expect("valid note pattern"),
        }
    }

    /// The Tainan municipal funeral parlour halls
    pub fn standard() -> Self {
        let mut rules = vec![
            VenueRule::exact("S01", "景行廳").or(MatchRule::Substring {
                token: "景行".to_string(),
                aliases: vec!["景德廳".to_string(), "景福廳".to_string()],
            }),
            VenueRule::exact("S02", "明德廳"),
            VenueRule::exact("S03", "至德廳"),
            VenueRule::exact("S04", "崇德廳"),
            VenueRule::exact("S05", "懷悌廳"),
            VenueRule::exact("S06", "懷澤廳"),
            VenueRule::exact("S07", "懷慈廳"),
            VenueRule::exact("S08", "懷親廳"),
            VenueRule::exact("S09", "懷恩廳"),
            VenueRule::exact("S10", "永安堂")
                .or(MatchRule::PrefixPattern("永安堂".to_string())),
            VenueRule::exact("S12", "光德廳").or(MatchRule::Substring {
                token: "光德".to_string(),
                aliases: Vec::new(),
            }),
            VenueRule::exact("S22", "無煙豎靈區"),
        ];

        let mut s20 = vec![RangeMember::Token("53-1".to_string())];
        s20.extend(numbers(54..=58));

        rules.extend([
            VenueRule::range("S15", "和平堂1-29", numbers(1..=29)),
            VenueRule::range("S16", "和平堂30-35", numbers(30..=35)),
            VenueRule::range("S17", "和平堂36-42", numbers(36..=42)),
            VenueRule::range("S18", "和平堂43-50", numbers(43..=50)),
            VenueRule::range("S19", "和平堂51-53", numbers(51..=53)),
            VenueRule::range("S20", "和平堂53-1-58", s20),
            VenueRule::range("S23", "和平堂59", numbers(59..=59)),
            VenueRule::range("S24", "和平堂60", numbers(60..=60)),
        ]);

        Self::new(rules)
    }

    /// Drop administrative notes such as （婉拒民代公祭）
    pub fn clean<'a>(&self, location: &'a str) -> std::borrow::Cow<'a, str> {
        self.notes.replace_all(location, "")
    }

    pub fn classify(&self, location: &str) -> Option<&str> {
        let cleaned = self.clean(location);
        self.rules
            .iter()
            .find(|rule| rule.matches(&cleaned))
            .inspect(|rule| trace!(location, code = %rule.code, venue = %rule.label, "classified"))
            .map(|rule| rule.code.as_str())
    }

    pub fn rules(&self) -> &[VenueRule] {
        &self.rules
    }
}

impl Default for VenueClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_canonical_names() {
        let classifier = VenueClassifier::standard();
        let exact = [
            ("景行廳", "S01"),
            ("明德廳", "S02"),
            ("至德廳", "S03"),
            ("崇德廳", "S04"),
            ("懷悌廳", "S05"),
            ("懷澤廳", "S06"),
            ("懷慈廳", "S07"),
            ("懷親廳", "S08"),
            ("懷恩廳", "S09"),
            ("永安堂", "S10"),
            ("光德廳", "S12"),
            ("無煙豎靈區", "S22"),
        ];
        for (name, code) in exact {
            assert_eq!(classifier.classify(name), Some(code), "{}", name);
        }
    }

    #[test]
    fn test_jingxing_aliases() {
        let classifier = VenueClassifier::standard();
        assert_eq!(classifier.classify("景德廳"), Some("S01"));
        assert_eq!(classifier.classify("景福廳"), Some("S01"));
        assert_eq!(classifier.classify("景行廳A"), Some("S01"));
        assert_eq!(classifier.classify("新景行"), Some("S01"));
    }

    #[test]
    fn test_fuzzy_fallbacks() {
        let classifier = VenueClassifier::standard();
        assert_eq!(classifier.classify("光德廳二樓"), Some("S12"));
        assert_eq!(classifier.classify("永安堂-3"), Some("S10"));
        assert_eq!(classifier.classify("永安堂-"), Some("S10"));
        assert_eq!(classifier.classify("永安堂3"), None);
    }

    #[test]
    fn test_heping_ranges() {
        let classifier = VenueClassifier::standard();
        assert_eq!(classifier.classify("和平堂-1"), Some("S15"));
        assert_eq!(classifier.classify("和平堂-29"), Some("S15"));
        assert_eq!(classifier.classify("和平堂-30"), Some("S16"));
        assert_eq!(classifier.classify("和平堂-42"), Some("S17"));
        assert_eq!(classifier.classify("和平堂-50"), Some("S18"));
        assert_eq!(classifier.classify("和平堂-53"), Some("S19"));
        assert_eq!(classifier.classify("和平堂-53-1"), Some("S20"));
        assert_eq!(classifier.classify("和平堂-58"), Some("S20"));
        assert_eq!(classifier.classify("和平堂-59"), Some("S23"));
        assert_eq!(classifier.classify("和平堂-60"), Some("S24"));
        assert_eq!(classifier.classify("和平堂-61"), None);
        assert_eq!(classifier.classify("和平堂-0"), None);
        assert_eq!(classifier.classify("和平堂-"), None);
        assert_eq!(classifier.classify("和平堂"), None);
    }

    #[test]
    fn test_numeric_suffix_with_leading_zero() {
        let classifier = VenueClassifier::standard();
        assert_eq!(classifier.classify("和平堂-07"), Some("S15"));
        assert_eq!(classifier.classify("和平堂-+7"), None);
    }

    #[test]
    fn test_parenthetical_notes_ignored() {
        let classifier = VenueClassifier::standard();
        assert_eq!(
            classifier.classify("明德廳（婉拒民代公祭）"),
            classifier.classify("明德廳")
        );
        assert_eq!(
            classifier.classify("和平堂-53-1（家奠）"),
            Some("S20")
        );
        assert_eq!(
            classifier.classify("某地點（婉拒民代公祭）"),
            classifier.classify("某地點")
        );
        assert_eq!(classifier.clean("（一）至德廳（二）"), "至德廳");
    }

    #[test]
    fn test_unknown_location() {
        let classifier = VenueClassifier::standard();
        assert_eq!(classifier.classify("自宅"), None);
        assert_eq!(classifier.classify(""), None);
    }

    #[test]
    fn test_table_codes_are_unique() {
        let classifier = VenueClassifier::standard();
        let codes: HashSet<&str> = classifier.rules().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes.len(), 20);
        assert_eq!(classifier.rules().len(), 20);
    }

    #[test]
    fn test_first_rule_wins() {
        let classifier = VenueClassifier::new(vec![
            VenueRule::exact("A", "甲").or(MatchRule::Substring {
                token: "廳".to_string(),
                aliases: Vec::new(),
            }),
            VenueRule::exact("B", "乙廳"),
        ]);
        assert_eq!(classifier.classify("乙廳"), Some("A"));
    }
}
