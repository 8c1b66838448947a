//! # Slice and String Helpers
//!
//! Linear membership scans and char-aware substring extraction.

/// Returns true when `needle` is one of `haystack`'s elements.
pub fn str_in_slice<S: AsRef<str>>(needle: &str, haystack: &[S]) -> bool {
    haystack.iter().any(|item| item.as_ref() == needle)
}

/// Returns the index of the first element equal to `needle`.
pub fn position_in_slice<T: PartialEq>(needle: &T, haystack: &[T]) -> Option<usize> {
    haystack.iter().position(|item| item == needle)
}

/// Returns true when any element equals `needle`.
pub fn contains_in_slice<T: PartialEq>(needle: &T, haystack: &[T]) -> bool {
    position_in_slice(needle, haystack).is_some()
}

/// Extracts the characters in `[start, end)`, counted in `char`s rather than
/// bytes so multi-byte text is never split.
///
/// Out-of-range bounds are clamped; an inverted range yields an empty string.
pub fn substr(s: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let byte_at = |idx: usize| {
        s.char_indices()
            .nth(idx)
            .map(|(offset, _)| offset)
            .unwrap_or(s.len())
    };
    &s[byte_at(start)..byte_at(end)]
}
