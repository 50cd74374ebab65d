//! Field normalization helpers shared by the map stage and record stores.

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_inline_whitespace<T: AsRef<str>>(text: T) -> String {
    let mut normalized = String::new();
    let mut seen_space = false;
    for ch in text.as_ref().chars() {
        if ch.is_whitespace() {
            if !seen_space {
                normalized.push(' ');
                seen_space = true;
            }
        } else {
            normalized.push(ch);
            seen_space = false;
        }
    }
    normalized.trim().to_string()
}

/// Normalize an optional field, mapping blank values to `None`.
pub fn non_blank<T: AsRef<str>>(value: Option<T>) -> Option<String> {
    value
        .map(normalize_inline_whitespace)
        .filter(|value| !value.is_empty())
}

/// Validate a decimal amount and return its trimmed text.
///
/// The original text is kept so reports show the figure the store reported
/// (`100.00` stays `100.00`). Returns `None` for non-numeric or non-finite input.
pub fn parse_amount(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = trimmed.parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(trimmed.to_string())
}
