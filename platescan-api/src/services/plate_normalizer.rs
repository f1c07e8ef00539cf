//! Canonical plate identifier derivation from raw OCR text
//!
//! Pure functions, no I/O. The canonical form is three digits, the literal
//! separator token, then four digits: `SSS<sep>NNNN`. Series is the first
//! three digits of the digit-only extraction, number is the last four; both
//! are left-zero-padded. When the extraction holds fewer than seven digits
//! the two slices overlap — a lossy but deterministic normalization, kept
//! as-is rather than treated as an error.

/// Literal token between the series and number segments
pub const PLATE_SEPARATOR: &str = "تونس";

/// Derive the canonical plate identifier from arbitrary OCR text.
///
/// Returns `None` when the text contains no digit characters at all; a
/// plate identifier is only ever built from a non-empty digit extraction.
pub fn normalize(raw: &str) -> Option<String> {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_numeric()).collect();
    if digits.is_empty() {
        return None;
    }

    let series: String = digits.iter().take(3).collect();
    let number: String = digits[digits.len().saturating_sub(4)..].iter().collect();

    Some(format!(
        "{:0>3}{}{:0>4}",
        series, PLATE_SEPARATOR, number
    ))
}
