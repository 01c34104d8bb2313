//! File name normalization and wildcard matching
//!
//! Distributed files usually embed their generation date (`f_20230101.csv`).
//! To find the previous version of a file at a destination, both names are
//! normalized: every 8-digit run becomes the literal `{DATE}` placeholder, so
//! `f_20220101.csv` and `f_20230101.csv` compare equal.
//!
//! Source declarations may use the same placeholder directly
//! (`f_{DATE}.csv`), and may contain a `*` wildcard that is expanded against
//! a store listing through [`WildcardPattern`].

use crate::error::{CommonError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Placeholder that replaces embedded dates
pub const DATE_TOKEN: &str = "{DATE}";

/// Wildcard token accepted in source file names
pub const WILDCARD: char = '*';

const DATE_PATTERN: &str = r"\d{8}";

#[allow(clippy::expect_used)]
static DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DATE_PATTERN).expect("date pattern is a valid regex"));

/// Collapse every 8-digit run in `path` into [`DATE_TOKEN`]
///
/// Total and idempotent: the placeholder itself contains no digits, so
/// normalizing a normalized name returns it unchanged.
pub fn normalize(path: &str) -> String {
    DATE_REGEX.replace_all(path, DATE_TOKEN).into_owned()
}

/// True when two paths name the same logical file modulo embedded dates
pub fn same_logical_file(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// True when `name` contains the wildcard token
pub fn has_wildcard(name: &str) -> bool {
    name.contains(WILDCARD)
}

/// A compiled source file name with `*` wildcards
///
/// `*` matches any run of characters (directory separators included) and
/// `{DATE}` matches an 8-digit run. Everything else matches literally and
/// the whole path must match.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    regex: Regex,
}

impl WildcardPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut expr = String::from("^");
        for (i, part) in pattern.split(WILDCARD).enumerate() {
            if i > 0 {
                expr.push_str(".*");
            }
            let literals: Vec<String> = part.split(DATE_TOKEN).map(regex::escape).collect();
            expr.push_str(&literals.join(DATE_PATTERN));
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| CommonError::invalid_pattern(pattern, e))?;

        Ok(Self { regex })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}
