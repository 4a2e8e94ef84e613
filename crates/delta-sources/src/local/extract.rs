//! Field extraction from exploit-framework module sources.
//!
//! Module metadata lives in a Ruby hash literal (`'Name' => '...'`). Rather
//! than parse Ruby, each key is tried against an ordered list of strategies
//! and the first one that matches wins.

use once_cell::sync::Lazy;
use regex::Regex;

/// Keys pulled out of every module.
pub const MODULE_KEYS: [&str; 10] = [
    "Name",
    "Description",
    "Platform",
    "Targets",
    "Payloads",
    "Author",
    "References",
    "DisclosureDate",
    "EncoderType",
    "License",
];

/// A value extracted for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// Quoted string or bare constant
    Text(String),
    /// Bracketed list
    List(Vec<String>),
}

impl Extracted {
    /// Value as a single line; lists are joined with `, `.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join(", "),
        }
    }

    /// Value as a list; text becomes a single item.
    #[must_use]
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::Text(s) => vec![s.clone()],
            Self::List(items) => items.clone(),
        }
    }
}

/// Precompiled patterns for one key.
struct KeyPatterns {
    key: &'static str,
    quoted: Regex,
    symbol: Regex,
    list: Regex,
}

impl KeyPatterns {
    fn new(key: &'static str) -> Self {
        let k = regex::escape(key);
        Self {
            key,
            quoted: Regex::new(&format!(
                r#"(?s)'{k}'\s*=>\s*(?:%q\{{(.+?)\}}|'(.*?)'|"(.*?)")"#
            ))
            .expect("valid quoted pattern"),
            symbol: Regex::new(&format!(r"'{k}'\s*=>\s*([\w:]+)")).expect("valid symbol pattern"),
            list: Regex::new(&format!(r"(?s)'{k}'\s*=>\s*\[\s*([^\]]*)\s*\]"))
                .expect("valid list pattern"),
        }
    }
}

static PATTERNS: Lazy<Vec<KeyPatterns>> =
    Lazy::new(|| MODULE_KEYS.iter().map(|k| KeyPatterns::new(k)).collect());

static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"#.*").expect("valid comment pattern"));

type Strategy = fn(&KeyPatterns, &str) -> Option<Extracted>;

/// Tried in order; first match wins.
const STRATEGIES: [Strategy; 3] = [quoted_string, bare_constant, bracketed_list];

/// `'Key' => 'value'`, `"value"`, or `%q{value}`, possibly spanning lines.
fn quoted_string(patterns: &KeyPatterns, source: &str) -> Option<Extracted> {
    let caps = patterns.quoted.captures(source)?;
    let value = (1..=3).find_map(|i| caps.get(i))?;
    Some(Extracted::Text(value.as_str().trim().to_string()))
}

/// `'Key' => MSF_LICENSE`.
fn bare_constant(patterns: &KeyPatterns, source: &str) -> Option<Extracted> {
    let caps = patterns.symbol.captures(source)?;
    Some(Extracted::Text(caps[1].to_string()))
}

/// `'Key' => [ 'a', # comment \n 'b' ]`.
///
/// Nested lists are flattened up to the first closing bracket.
fn bracketed_list(patterns: &KeyPatterns, source: &str) -> Option<Extracted> {
    let caps = patterns.list.captures(source)?;
    let body = LINE_COMMENT.replace_all(&caps[1], "");
    let items = body
        .split(',')
        .map(|item| {
            item.trim_matches(|c: char| c.is_whitespace() || matches!(c, '\'' | '"' | '['))
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .collect();
    Some(Extracted::List(items))
}

/// Extract one key, or `None` when no strategy matches.
#[must_use]
pub fn extract(source: &str, key: &str) -> Option<Extracted> {
    let patterns = PATTERNS.iter().find(|p| p.key == key)?;
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(patterns, source))
}

/// Every key in [`MODULE_KEYS`] order, absent keys omitted.
#[must_use]
pub fn extract_all(source: &str) -> Vec<(&'static str, Extracted)> {
    PATTERNS
        .iter()
        .filter_map(|patterns| {
            STRATEGIES
                .iter()
                .find_map(|strategy| strategy(patterns, source))
                .map(|value| (patterns.key, value))
        })
        .collect()
}
