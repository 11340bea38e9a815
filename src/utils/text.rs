use std::borrow::Cow;

/// Pluralizes a piece of text.
pub fn pluralize(base: &str, count: usize) -> Cow<'_, str> {
    if count == 1 {
        base.into()
    } else {
        format!("{base}s").into()
    }
}

/// Returns at most `max_chars` characters of `text`, and whether anything was cut off.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => (&text[..index], true),
        None => (text, false),
    }
}

/// Shortens long texts (e.g. review summaries) so that they fit into a single log line.
pub fn preview(text: &str) -> Cow<'_, str> {
    match truncate_chars(text, 100) {
        (text, false) => text.into(),
        (text, true) => format!("{text}...").into(),
    }
}
