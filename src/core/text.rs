//! Grapheme-aware text truncation.

use unicode_segmentation::UnicodeSegmentation;

/// Truncates `s` to at most `max` graphemes.
///
/// Strings that already fit are returned unchanged. Longer strings keep the
/// first `max - 3` graphemes followed by `"..."`. For `max < 3` the result is
/// just the first `max` graphemes with no ellipsis.
#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    let mut graphemes = s.grapheme_indices(true);
    // Fast path: nothing past index `max`.
    if graphemes.nth(max).is_none() {
        return s.to_string();
    }

    if max < 3 {
        return s.graphemes(true).take(max).collect();
    }

    let keep = max - 3;
    let cut = s
        .grapheme_indices(true)
        .nth(keep)
        .map_or(s.len(), |(idx, _)| idx);
    format!("{}...", &s[..cut])
}

/// Appends `"..."` after the first `max` graphemes when `s` is longer.
///
/// Unlike [`truncate`], the ellipsis does not count toward `max`.
#[must_use]
pub fn clip(s: &str, max: usize) -> String {
    match s.grapheme_indices(true).nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
