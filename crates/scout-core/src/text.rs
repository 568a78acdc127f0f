/// Truncate `s` to at most `max_chars` characters, appending `...` when cut.
/// Always splits on a char boundary.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
