/*!
 * Completer settings
 */

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How keyword candidates are cased
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeywordCasing {
    Upper,
    Lower,
    /// Follow the case of the last letter typed
    #[default]
    Auto,
}

impl KeywordCasing {
    /// Apply the casing to `keyword`, given the fragment typed so far
    pub fn apply(self, keyword: &str, typed: &str) -> String {
        let lower = match self {
            KeywordCasing::Upper => false,
            KeywordCasing::Lower => true,
            KeywordCasing::Auto => typed
                .chars()
                .next_back()
                .is_some_and(|c| c.is_lowercase()),
        };
        if lower {
            keyword.to_lowercase()
        } else {
            keyword.to_uppercase()
        }
    }
}

/// When column candidates are prefixed with their table reference
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QualifyColumns {
    Always,
    Never,
    #[default]
    IfMoreThanOneTable,
}

#[derive(Debug, Error)]
#[error("unknown {setting} value '{value}' (expected one of: {expected})")]
pub struct ParseSettingError {
    setting: &'static str,
    value: String,
    expected: &'static str,
}

impl FromStr for KeywordCasing {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upper" => Ok(KeywordCasing::Upper),
            "lower" => Ok(KeywordCasing::Lower),
            "auto" => Ok(KeywordCasing::Auto),
            _ => Err(ParseSettingError {
                setting: "keyword casing",
                value: s.to_string(),
                expected: "upper, lower, auto",
            }),
        }
    }
}

impl FromStr for QualifyColumns {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "always" => Ok(QualifyColumns::Always),
            "never" => Ok(QualifyColumns::Never),
            "if-more-than-one-table" => Ok(QualifyColumns::IfMoreThanOneTable),
            _ => Err(ParseSettingError {
                setting: "column qualification",
                value: s.to_string(),
                expected: "always, never, if-more-than-one-table",
            }),
        }
    }
}

impl fmt::Display for KeywordCasing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeywordCasing::Upper => "upper",
            KeywordCasing::Lower => "lower",
            KeywordCasing::Auto => "auto",
        })
    }
}

/// Behaviour switches for [`SqlCompleter`](super::SqlCompleter)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompleterSettings {
    /// Context-sensitive completion; when off, keywords and built-in
    /// functions are offered alphabetically
    pub smart_completion: bool,
    pub keyword_casing: KeywordCasing,
    pub qualify_columns: QualifyColumns,
    /// Number of recent history entries used to seed keyword prevalence
    pub history_seed_size: usize,
}

impl Default for CompleterSettings {
    fn default() -> Self {
        Self {
            smart_completion: true,
            keyword_casing: KeywordCasing::Auto,
            qualify_columns: QualifyColumns::IfMoreThanOneTable,
            history_seed_size: 100,
        }
    }
}
