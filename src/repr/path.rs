//! Hierarchical path values and the ultrametric cost between them.
//!
//! A [`PathValue`] is a position in a taxonomy written as dot-joined
//! non-negative integers, e.g. `1.4.2`. Two paths are compared by the length
//! of their shared leading components, which gives the [`cost`] used by the
//! whole crate.
//!
//! # Example
//!
//! ```
//! use ultratree::repr::{cost, PathValue};
//!
//! let a: PathValue = "1.2.3".parse().unwrap();
//! let b: PathValue = "1.4.3".parse().unwrap();
//!
//! assert_eq!(a.common_prefix_len(&b), 1);
//! assert_eq!(cost(&a, &b), 0.5);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// PathParseError
// ============================================================================

/// Text that is not a valid path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    /// The input string (or component list) was empty.
    #[error("malformed path: empty input")]
    Empty,

    /// A dot-separated component is not a canonical non-negative integer.
    #[error("malformed path '{input}': invalid component '{component}'")]
    InvalidComponent {
        /// The full input text.
        input: String,
        /// The offending component.
        component: String,
    },
}

// ============================================================================
// PathValue
// ============================================================================

/// Immutable hierarchical code: a non-empty sequence of non-negative integers.
///
/// Ordering is lexicographic over the components, so a prefix sorts before
/// every path it contains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PathValue(Vec<u32>);

impl PathValue {
    /// Build a path from its components.
    pub fn new(components: Vec<u32>) -> Result<Self, PathParseError> {
        if components.is_empty() {
            return Err(PathParseError::Empty);
        }
        Ok(Self(components))
    }

    /// Parse dot-joined text, e.g. `"1.2.3"`.
    ///
    /// Components must be plain decimal digits without sign or leading zeros
    /// (a lone `0` is fine), so that parsing and printing round-trip exactly.
    pub fn parse(text: &str) -> Result<Self, PathParseError> {
        if text.is_empty() {
            return Err(PathParseError::Empty);
        }
        let invalid = |component: &str| PathParseError::InvalidComponent {
            input: text.to_string(),
            component: component.to_string(),
        };

        let mut components = Vec::with_capacity(text.len() / 2 + 1);
        for component in text.split('.') {
            let canonical = !component.is_empty()
                && component.bytes().all(|b| b.is_ascii_digit())
                && (component.len() == 1 || !component.starts_with('0'));
            if !canonical {
                return Err(invalid(component));
            }
            let value = component.parse::<u32>().map_err(|_| invalid(component))?;
            components.push(value);
        }
        Ok(Self(components))
    }

    /// Components of the path.
    #[inline]
    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// Number of components (always at least 1).
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; paths are non-empty by construction.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Count of leading components shared with `other`.
    #[inline]
    pub fn common_prefix_len(&self, other: &PathValue) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// True if `self` is a (non-strict) prefix of `other`.
    #[inline]
    pub fn is_prefix_of(&self, other: &PathValue) -> bool {
        other.0.starts_with(&self.0)
    }

    /// True if one of the two paths is a prefix of the other.
    #[inline]
    pub fn is_prefix_related(&self, other: &PathValue) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    /// Region membership: `value` lies inside the region rooted at `self`.
    ///
    /// This is the single inside/outside test used by both split search and
    /// inference.
    #[inline]
    pub fn contains(&self, value: &PathValue) -> bool {
        self.is_prefix_of(value)
    }

    /// The first `len` components, or `None` if `len` is 0 or too long.
    pub fn truncated(&self, len: usize) -> Option<PathValue> {
        if len == 0 || len > self.0.len() {
            return None;
        }
        Some(Self(self.0[..len].to_vec()))
    }

    /// The path with its last component removed, or `None` for a top-level path.
    pub fn parent(&self) -> Option<PathValue> {
        self.truncated(self.0.len() - 1)
    }

    /// Every prefix of this path, shortest first, ending with the path itself.
    pub fn prefixes(&self) -> impl Iterator<Item = PathValue> + '_ {
        (1..=self.0.len()).map(move |len| Self(self.0[..len].to_vec()))
    }
}

impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut components = self.0.iter();
        if let Some(first) = components.next() {
            write!(f, "{first}")?;
        }
        for c in components {
            write!(f, ".{c}")?;
        }
        Ok(())
    }
}

impl FromStr for PathValue {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PathValue {
    type Error = PathParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for PathValue {
    type Error = PathParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PathValue> for String {
    fn from(value: PathValue) -> Self {
        value.to_string()
    }
}

// ============================================================================
// Cost
// ============================================================================

/// Hierarchical dissimilarity: `2^-(common prefix length)`.
///
/// Identical paths cost `2^-len`; paths that differ in their first component
/// cost exactly 1.
#[inline]
pub fn cost(a: &PathValue, b: &PathValue) -> f64 {
    (-(a.common_prefix_len(b) as f64)).exp2()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn p(s: &str) -> PathValue {
        s.parse().unwrap()
    }

    #[rstest]
    #[case("1.2.3", &[1, 2, 3])]
    #[case("42", &[42])]
    #[case("0", &[0])]
    #[case("1.2.3.4.5.6.7.8.9.10", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])]
    #[case("10.0.7", &[10, 0, 7])]
    fn parse_round_trips(#[case] text: &str, #[case] expected: &[u32]) {
        let path = PathValue::parse(text).unwrap();
        assert_eq!(path.components(), expected);
        assert_eq!(path.to_string(), text);
    }

    #[rstest]
    #[case("")]
    #[case("1.2.three.4")]
    #[case("1..2.3")]
    #[case("1.-2.3")]
    #[case(".1")]
    #[case("1.")]
    #[case("+1")]
    #[case("01.2")]
    #[case("1 .2")]
    #[case("99999999999")]
    fn parse_rejects_malformed(#[case] text: &str) {
        assert!(PathValue::parse(text).is_err(), "{text:?} should not parse");
    }

    #[test]
    fn empty_input_has_dedicated_error() {
        assert_eq!(PathValue::parse(""), Err(PathParseError::Empty));
        assert_eq!(PathValue::new(vec![]), Err(PathParseError::Empty));
    }

    #[test]
    fn invalid_component_names_the_component() {
        let err = PathValue::parse("1.x.2").unwrap_err();
        assert_eq!(
            err,
            PathParseError::InvalidComponent {
                input: "1.x.2".into(),
                component: "x".into()
            }
        );
        assert!(err.to_string().contains("'x'"));
    }

    #[rstest]
    #[case("1.2.3", "1.4.3", 0.5)]
    #[case("1.2.3", "1.2.3.1.5", 0.125)]
    #[case("1.2", "3.1", 1.0)]
    #[case("1.2", "1.2", 0.25)]
    #[case("7", "7.1.1", 0.5)]
    fn cost_matches_shared_prefix(#[case] a: &str, #[case] b: &str, #[case] expected: f64) {
        assert_eq!(cost(&p(a), &p(b)), expected);
        assert_eq!(cost(&p(b), &p(a)), expected);
    }

    #[test]
    fn prefix_relations() {
        let region = p("1.2");
        assert!(region.contains(&p("1.2")));
        assert!(region.contains(&p("1.2.9")));
        assert!(!region.contains(&p("1")));
        assert!(!region.contains(&p("1.23")));
        assert!(!region.contains(&p("1.3.2")));
        assert!(region.is_prefix_related(&p("1")));
        assert!(!region.is_prefix_related(&p("2")));
    }

    #[test]
    fn prefixes_shortest_first() {
        let all: Vec<String> = p("2.3.4").prefixes().map(|x| x.to_string()).collect();
        assert_eq!(all, vec!["2", "2.3", "2.3.4"]);
        assert_eq!(p("2.3.4").parent(), Some(p("2.3")));
        assert_eq!(p("2").parent(), None);
        assert_eq!(p("2.3").truncated(0), None);
        assert_eq!(p("2.3").truncated(3), None);
    }

    #[test]
    fn serde_uses_text_form() {
        let json = serde_json::to_string(&p("1.20.3")).unwrap();
        assert_eq!(json, "\"1.20.3\"");
        let back: PathValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p("1.20.3"));
        assert!(serde_json::from_str::<PathValue>("\"1..3\"").is_err());
    }

    #[test]
    fn ordering_puts_prefix_first() {
        let mut paths = vec![p("1.2.1"), p("2"), p("1.2"), p("1")];
        paths.sort();
        let text: Vec<String> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(text, vec!["1", "1.2", "1.2.1", "2"]);
    }
}
