/// Shortens an HTTP body for log lines and error messages.
pub fn snippet(text: &str) -> String {
    const MAX_CHARS: usize = 200;

    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(MAX_CHARS).collect();
    short.push('…');
    short
}

/// Cuts `text` so that it fits in `max_units` UTF-16 code units, never
/// splitting a character.
pub fn truncate_utf16(text: &str, max_units: usize) -> &str {
    let mut units = 0;
    for (byte_index, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > max_units {
            return &text[..byte_index];
        }
    }
    text
}
