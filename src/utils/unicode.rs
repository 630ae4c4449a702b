//! Unicode-safe helpers for the console input line.

use unicode_width::UnicodeWidthStr;

/// Convert a character index (0-based) to a byte index in the given string.
/// If `n` exceeds the number of characters, returns `s.len()`.
pub fn char_to_byte_index(s: &str, n: usize) -> usize {
    match s.char_indices().nth(n) {
        Some((i, _)) => i,
        None => s.len(),
    }
}

/// Terminal columns taken by the first `n` characters of `s`.
pub fn prefix_width(s: &str, n: usize) -> usize {
    s[..char_to_byte_index(s, n)].width()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_index_follows_char_boundaries() {
        assert_eq!(char_to_byte_index("aé b", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn wide_characters_take_two_columns() {
        assert_eq!(prefix_width("日本語", 2), 4);
        assert_eq!(prefix_width("héllo", 3), 3);
        assert_eq!(prefix_width("", 5), 0);
    }
}
