/*!
 * Candidate matching and ordering primitives
 *
 * Scores a candidate against the typed fragment (fuzzy or strict prefix)
 * and provides the lexical tie-break key plus name quoting helpers.
 */

use super::literals::Literals;
use regex::Regex;

/// How well a candidate matches the typed fragment; greater is better
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchScore {
    /// Strict prefix match
    Strict { neg_start: i64 },
    /// Fuzzy subsequence match: shorter, earlier spans win
    Fuzzy { neg_len: i64, neg_start: i64 },
    /// The candidate is the fragment, optionally followed by a space
    Exact,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    Fuzzy,
    Strict,
}

/// Matcher for one typed fragment
#[derive(Debug)]
pub struct Matcher {
    text: String,
    fuzzy: Option<Regex>,
}

impl Matcher {
    /// `word` is the fragment before the cursor. A leading double quote is
    /// ignored for matching.
    pub fn new(word: &str) -> Self {
        let lowered = word.to_lowercase();
        let text = lowered.strip_prefix('"').unwrap_or(&lowered).to_string();
        let pattern = text
            .chars()
            .map(|c| regex::escape(&c.to_string()))
            .collect::<Vec<_>>()
            .join(".*?");
        Self {
            fuzzy: Regex::new(&format!("({pattern})")).ok(),
            text,
        }
    }

    /// Fragment used for matching, lower-cased
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn score(&self, item: &str, mode: MatchMode) -> Option<MatchScore> {
        let lowered = item.to_lowercase();
        match mode {
            MatchMode::Fuzzy => {
                if let Some(rest) = lowered.strip_prefix(self.text.as_str()) {
                    if rest.is_empty() || rest.starts_with(' ') {
                        return Some(MatchScore::Exact);
                    }
                }
                let haystack = unescape_name(&lowered);
                self.fuzzy
                    .as_ref()?
                    .find(haystack)
                    .map(|m| MatchScore::Fuzzy {
                        neg_len: -(m.as_str().chars().count() as i64),
                        neg_start: -char_index(haystack, m.start()),
                    })
            }
            MatchMode::Strict => lowered
                .starts_with(self.text.as_str())
                .then_some(MatchScore::Strict { neg_start: 0 }),
        }
    }

    /// Best score over a candidate and its synonyms
    pub fn score_any<'s>(
        &self,
        names: impl IntoIterator<Item = &'s str>,
        mode: MatchMode,
    ) -> Option<MatchScore> {
        names.into_iter().filter_map(|n| self.score(n, mode)).max()
    }
}

fn char_index(s: &str, byte: usize) -> i64 {
    s[..byte].chars().count() as i64
}

/// Alphabetical tie-break key
///
/// Case-folded and unquoted, with spaces and underscores sorting first; the
/// raw text breaks remaining ties. Compared in descending order like the
/// rest of the sort key, so each character is negated.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LexicalKey {
    folded: Vec<i64>,
    raw: Vec<i64>,
}

impl LexicalKey {
    pub fn new(item: &str) -> Self {
        let lowered = item.to_lowercase();
        let mut folded: Vec<i64> = unescape_name(&lowered)
            .chars()
            .map(|c| match c {
                ' ' | '_' => 0,
                c => -(c as i64),
            })
            .collect();
        folded.push(1);
        Self {
            folded,
            raw: item.chars().map(|c| -(c as i64)).collect(),
        }
    }
}

/// Strip one pair of surrounding double quotes
pub fn unescape_name(name: &str) -> &str {
    if name.len() >= 2 && name.starts_with('"') && name.ends_with('"') {
        &name[1..name.len() - 1]
    } else {
        name
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Double-quote `name` when it would not survive unquoted: unusual
/// characters, reserved words and built-in function names
pub fn escape_name(name: &str, literals: &Literals) -> String {
    if name.is_empty() || name.starts_with('"') {
        return name.to_string();
    }
    if !is_plain_identifier(name) || literals.is_reserved(name) || literals.is_function(name) {
        format!("\"{name}\"")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_beats_fuzzy() {
        let m = Matcher::new("sel");
        assert_eq!(m.score("sel", MatchMode::Fuzzy), Some(MatchScore::Exact));
        assert_eq!(m.score("SEL x", MatchMode::Fuzzy), Some(MatchScore::Exact));
        let fuzzy = m.score("SELECT", MatchMode::Fuzzy).unwrap();
        assert_eq!(fuzzy, MatchScore::Fuzzy { neg_len: -3, neg_start: 0 });
        assert!(MatchScore::Exact > fuzzy);
    }

    #[test]
    fn test_fuzzy_prefers_tight_early_matches() {
        let m = Matcher::new("ord");
        let tight = m.score("orders", MatchMode::Fuzzy).unwrap();
        let late = m.score("my_orders", MatchMode::Fuzzy).unwrap();
        let loose = m.score("o_r_d", MatchMode::Fuzzy).unwrap();
        assert!(tight > late);
        assert!(tight > loose);
        assert_eq!(m.score("customers", MatchMode::Fuzzy), None);
    }

    #[test]
    fn test_fuzzy_is_ranked_above_strict() {
        let m = Matcher::new("or");
        let fuzzy = m.score("orders", MatchMode::Fuzzy).unwrap();
        let strict = m.score("ORDER", MatchMode::Strict).unwrap();
        assert!(fuzzy > strict);
    }

    #[test]
    fn test_equal_scores_fall_back_to_lexical_order() {
        let m = Matcher::new("se");
        let mut ranked: Vec<(MatchScore, LexicalKey, &str)> = ["SESSION", "SET", "SELECT"]
            .into_iter()
            .map(|item| (m.score(item, MatchMode::Fuzzy).unwrap(), LexicalKey::new(item), item))
            .collect();
        assert!(ranked.iter().all(|(score, ..)| *score == ranked[0].0));
        ranked.sort_by(|a, b| (&b.0, &b.1).cmp(&(&a.0, &a.1)));
        let order: Vec<&str> = ranked.iter().map(|(.., item)| *item).collect();
        assert_eq!(order, vec!["SELECT", "SESSION", "SET"]);
    }

    #[test]
    fn test_strict_is_prefix_only() {
        let m = Matcher::new("ma");
        assert!(m.score("MAX", MatchMode::Strict).is_some());
        assert!(m.score("COLUMN_MAX", MatchMode::Strict).is_none());
        assert!(Matcher::new("").score("ANY", MatchMode::Strict).is_some());
    }

    #[test]
    fn test_quoted_fragment() {
        let m = Matcher::new("\"my");
        assert_eq!(m.text(), "my");
        assert!(m.score("\"My Table\"", MatchMode::Fuzzy).is_some());
    }

    #[test]
    fn test_lexical_key_orders_alphabetically_when_descending() {
        let mut items = vec!["b", "a_c", "ab", "A"];
        items.sort_by(|x, y| LexicalKey::new(y).cmp(&LexicalKey::new(x)));
        assert_eq!(items, vec!["A", "a_c", "ab", "b"]);
    }

    #[test]
    fn test_escape_round_trip() {
        let literals = Literals::builtin().unwrap();
        assert_eq!(escape_name("orders", &literals), "orders");
        assert_eq!(escape_name("My Table", &literals), "\"My Table\"");
        assert_eq!(escape_name("user", &literals), "\"user\"");
        assert_eq!(escape_name("count", &literals), "\"count\"");
        for name in ["orders", "My Table", "user", "9lives"] {
            assert_eq!(unescape_name(&escape_name(name, &literals)), name);
        }
    }
}
