//! Validation rule parsing and pattern matching helpers.
//!
//! Rule expressions use the tag syntax `rule[=param][,rule[=param]...]`, for
//! example `required,min=5` or `oneof=admin cashier`. Evaluating the rules is
//! the validator's job; this module only parses them and provides the shared
//! compiled-pattern cache used by regex-backed rules.

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use regex::Regex;

/// One parsed rule of a `validate` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule<'a> {
    /// Rule tag, e.g. `min`
    pub tag: &'a str,
    /// Parameter after `=`, e.g. `5`
    pub param: Option<&'a str>,
}

/// Split a rule expression into rules, skipping empty segments.
pub fn parse_rules(expr: &str) -> Vec<Rule<'_>> {
    expr.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((tag, param)) => Rule {
                tag: tag.trim(),
                param: Some(param.trim()),
            },
            None => Rule {
                tag: segment,
                param: None,
            },
        })
        .collect()
}

/// Thread-safe cache of compiled patterns.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check if a string matches a regex pattern.
///
/// Compiled patterns are cached for the lifetime of the process. An invalid
/// pattern is logged and treated as a non-match.
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern in validation, treating as non-match"
            );
            false
        }
    }
}

/// First capture group of `pattern` in `value`, if the pattern matches.
///
/// Shares the compiled-pattern cache with [`matches_pattern`]; an invalid
/// pattern is logged and treated as a non-match.
pub fn first_capture<'a>(value: &'a str, pattern: &str) -> Option<&'a str> {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex
            .captures(value)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str()),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern, treating as non-match"
            );
            None
        }
    }
}

/// Check a pattern at build time (for use in proc macros).
///
/// Returns an error message if the pattern is invalid.
pub fn validate_pattern(pattern: &str) -> Option<String> {
    match Regex::new(pattern) {
        Ok(_) => None,
        Err(e) => Some(format!("invalid regex pattern: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules() {
        let rules = parse_rules("required, min=5 ,,oneof=admin cashier");
        assert_eq!(
            rules,
            vec![
                Rule {
                    tag: "required",
                    param: None
                },
                Rule {
                    tag: "min",
                    param: Some("5")
                },
                Rule {
                    tag: "oneof",
                    param: Some("admin cashier")
                },
            ]
        );
        assert!(parse_rules("").is_empty());
    }

    #[test]
    fn test_matches_email_pattern() {
        let email_pattern = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
        assert!(matches_pattern("test@example.com", email_pattern));
        assert!(!matches_pattern("invalid", email_pattern));
        assert!(!matches_pattern("test@", email_pattern));
    }

    #[test]
    fn test_time_of_day_pattern() {
        let hour = r"^([01]\d|2[0-3]):([0-5]\d)$";
        assert!(matches_pattern("09:30", hour));
        assert!(matches_pattern("23:59", hour));
        assert!(!matches_pattern("24:00", hour));
    }

    #[test]
    fn test_invalid_pattern_returns_false() {
        assert!(!matches_pattern("anything", r"[unclosed"));
        assert!(validate_pattern(r"[unclosed").is_some());
        assert!(validate_pattern(r"^\d{4}$").is_none());
    }

    #[test]
    fn test_first_capture() {
        let pattern = r"SQLSTATE ([0-9A-Z]{5})";
        assert_eq!(
            first_capture("duplicate key (SQLSTATE 23505)", pattern),
            Some("23505")
        );
        assert_eq!(first_capture("connection reset", pattern), None);
        assert_eq!(first_capture("x", r"([unclosed"), None);
    }

    #[test]
    fn test_regex_caching() {
        let pattern = r"^test\d+$";
        assert!(matches_pattern("test123", pattern));
        assert!(matches_pattern("test456", pattern));
        assert!(!matches_pattern("invalid", pattern));
    }
}
