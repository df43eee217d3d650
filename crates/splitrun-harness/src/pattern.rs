//! Name patterns and include/exclude filters over test case names
//!
//! A pattern is a glob over case names where `*` matches any run of
//! characters and `?` matches exactly one. Matching is case-sensitive and
//! anchored at both ends, so `*FunctionalTest` only matches names that end
//! with `FunctionalTest`.
//!
//! Patterns without a `.` are matched against the simple name (the segment
//! after the last `.`); patterns containing a `.` are matched against the
//! fully-qualified name.

use crate::error::{HarnessError, HarnessResult};
use std::fmt;

/// Simple name of a fully-qualified case name
///
/// `com.shop.auth.LoginTest` becomes `LoginTest`; a name without a `.` is
/// returned unchanged.
pub fn simple_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Match `text` against a glob `pattern` supporting `*` and `?`
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen and the text index it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// A compiled case-name pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamePattern {
    raw: String,
    qualified: bool,
}

impl NamePattern {
    /// Parse a pattern, rejecting empty or whitespace-containing input
    pub fn new(pattern: impl Into<String>) -> HarnessResult<Self> {
        let raw = pattern.into();
        if raw.is_empty() {
            return Err(HarnessError::invalid_pattern(raw, "pattern is empty"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(HarnessError::invalid_pattern(raw, "pattern contains whitespace"));
        }
        let qualified = raw.contains('.');
        Ok(Self { raw, qualified })
    }

    /// Build from a pattern known to be valid at compile time
    pub(crate) fn trusted(raw: &'static str) -> Self {
        Self {
            raw: raw.to_string(),
            qualified: raw.contains('.'),
        }
    }

    /// Parse several patterns at once
    pub fn parse_all<I, S>(patterns: I) -> HarnessResult<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        patterns.into_iter().map(Self::new).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern applies to the fully-qualified name
    pub fn is_qualified(&self) -> bool {
        self.qualified
    }

    /// Check a case name against the pattern
    pub fn matches(&self, name: &str) -> bool {
        if self.qualified {
            glob_match(&self.raw, name)
        } else {
            glob_match(&self.raw, simple_name(name))
        }
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Include/exclude selection over case names
///
/// A name is selected when it matches at least one include pattern (or
/// there are none), matches no exclude pattern, and matches at least one
/// narrowing pattern when narrowing is in effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFilter {
    includes: Vec<NamePattern>,
    excludes: Vec<NamePattern>,
    narrowing: Vec<NamePattern>,
}

impl TestFilter {
    /// A filter selecting every name
    pub fn all() -> Self {
        Self::default()
    }

    pub fn include(mut self, pattern: NamePattern) -> Self {
        self.includes.push(pattern);
        self
    }

    pub fn exclude(mut self, pattern: NamePattern) -> Self {
        self.excludes.push(pattern);
        self
    }

    /// Restrict the selection further, like `--tests` on the command line
    pub fn narrowed_by(mut self, patterns: impl IntoIterator<Item = NamePattern>) -> Self {
        self.narrowing.extend(patterns);
        self
    }

    pub fn includes(&self) -> &[NamePattern] {
        &self.includes
    }

    pub fn excludes(&self) -> &[NamePattern] {
        &self.excludes
    }

    /// Whether a case name is selected
    pub fn matches(&self, name: &str) -> bool {
        let included = self.includes.is_empty() || self.includes.iter().any(|p| p.matches(name));
        let excluded = self.excludes.iter().any(|p| p.matches(name));
        let narrowed = self.narrowing.is_empty() || self.narrowing.iter().any(|p| p.matches(name));
        included && !excluded && narrowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pattern(raw: &str) -> NamePattern {
        NamePattern::new(raw).unwrap()
    }

    #[rstest]
    #[case("*FunctionalTest", "LoginFunctionalTest", true)]
    #[case("*FunctionalTest", "FunctionalTest", true)]
    #[case("*FunctionalTest", "FunctionalTestHelper", false)]
    #[case("*FunctionalTest", "LoginFunctionaltest", false)]
    #[case("*FunctionalTest", "LoginTest", false)]
    #[case("*Test", "LoginTest", true)]
    #[case("Login*", "LoginFunctionalTest", true)]
    #[case("*Func*Test", "LoginFunctionalTest", true)]
    #[case("Log?nTest", "LoginTest", true)]
    #[case("Log?nTest", "LogTest", false)]
    #[case("*", "", true)]
    #[case("a*b*c", "aXbYbZc", true)]
    #[case("a*b*c", "aXbYbZ", false)]
    fn test_glob_match(#[case] pattern: &str, #[case] text: &str, #[case] expected: bool) {
        assert_eq!(glob_match(pattern, text), expected);
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(simple_name("com.shop.auth.LoginTest"), "LoginTest");
        assert_eq!(simple_name("LoginTest"), "LoginTest");
    }

    #[test]
    fn test_unqualified_pattern_uses_simple_name() {
        let functional = pattern("*FunctionalTest");
        assert!(!functional.is_qualified());
        assert!(functional.matches("com.shop.auth.LoginFunctionalTest"));
        assert!(!functional.matches("com.shop.FunctionalTest.Helper"));
    }

    #[test]
    fn test_qualified_pattern_uses_full_name() {
        let auth = pattern("com.shop.auth.*");
        assert!(auth.is_qualified());
        assert!(auth.matches("com.shop.auth.LoginTest"));
        assert!(!auth.matches("com.shop.cart.CartTest"));
        assert!(!auth.matches("LoginTest"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(NamePattern::new("").is_err());
        assert!(NamePattern::new("* Test").is_err());
    }

    #[test]
    fn test_filter_include_and_exclude() {
        let filter = TestFilter::all()
            .include(pattern("*Test"))
            .exclude(pattern("*FunctionalTest"));

        assert!(filter.matches("LoginTest"));
        assert!(!filter.matches("LoginFunctionalTest"));
        assert!(!filter.matches("LoginSpec"));
    }

    #[test]
    fn test_filter_narrowing_intersects() {
        let filter = TestFilter::all()
            .exclude(pattern("*FunctionalTest"))
            .narrowed_by(vec![pattern("Login*")]);

        assert!(filter.matches("LoginTest"));
        assert!(!filter.matches("CheckoutTest"));
        assert!(!filter.matches("LoginFunctionalTest"));
    }

    #[test]
    fn test_empty_filter_selects_everything() {
        assert!(TestFilter::all().matches("anything.AtAll"));
    }
}
