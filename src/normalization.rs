/// Normalizes user-entered text by stripping surrounding whitespace
/// and composing it into Unicode Normalization Form C.
///
/// ```
/// use client::normalization::normalize_text;
/// assert_eq!(normalize_text(" cafe\u{301} "), "caf\u{e9}");
/// ```
pub fn normalize_text(text: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    text.as_ref().trim().nfc().collect()
}

/// Keeps at most `max` characters of `text`, the way a length-capped
/// input field does.
///
/// ```
/// use client::normalization::truncate_chars;
/// assert_eq!(truncate_chars("héllo", 2), "hé");
/// ```
pub fn truncate_chars(text: impl AsRef<str>, max: usize) -> String {
    text.as_ref().chars().take(max).collect()
}
