//! # Lenient Boolean Parsing
//!
//! Purpose: Interpret configuration-style flags ("1", "on", "FALSE", ...)
//! without forcing callers to handle parse errors.
//!
//! Unknown input is neither true nor false: `is_true` and `is_false` both
//! return `false` for it, while `not_true` returns `true`.

const TRUE_LITERALS: [&str; 4] = ["1", "t", "true", "on"];
const FALSE_LITERALS: [&str; 4] = ["0", "f", "false", "off"];

/// Parses a boolean literal, ignoring ASCII case.
///
/// Returns `None` for anything outside the accepted literal sets.
pub fn parse_bool(value: &str) -> Option<bool> {
    if TRUE_LITERALS.iter().any(|lit| value.eq_ignore_ascii_case(lit)) {
        return Some(true);
    }
    if FALSE_LITERALS.iter().any(|lit| value.eq_ignore_ascii_case(lit)) {
        return Some(false);
    }
    None
}

/// Returns true only for a recognised true literal.
pub fn is_true(value: &str) -> bool {
    parse_bool(value) == Some(true)
}

/// Returns true for everything that is not a true literal, including garbage.
pub fn not_true(value: &str) -> bool {
    !is_true(value)
}

/// Returns true only for a recognised false literal.
pub fn is_false(value: &str) -> bool {
    parse_bool(value) == Some(false)
}
