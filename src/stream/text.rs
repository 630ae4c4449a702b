//! Output text handling: BOM suppression, UTF-8 decoding, console markup.

use crate::console::document::LINE_BREAK;

/// Length of the UTF-8 byte-order mark (0xEF 0xBB 0xBF).
pub const UTF8_BOM_LEN: u8 = 3;

/// Drops the first [`UTF8_BOM_LEN`] bytes ever written, however the writes
/// are chunked. Once spent it never re-arms.
#[derive(Debug)]
pub struct BomFilter {
    remaining: u8,
}

impl Default for BomFilter {
    fn default() -> Self {
        Self {
            remaining: UTF8_BOM_LEN,
        }
    }
}

impl BomFilter {
    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    pub fn strip<'a>(&mut self, bytes: &'a [u8]) -> &'a [u8] {
        let skip = usize::from(self.remaining).min(bytes.len());
        // skip <= remaining <= 3
        self.remaining -= skip as u8;
        &bytes[skip..]
    }
}

/// UTF-8 decoder that holds back a multi-byte sequence cut off at the end
/// of a write until the next write completes it.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(bytes);
        let keep = incomplete_tail_len(&data);
        self.pending = data.split_off(data.len() - keep);
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Flush held-back bytes lossily; a truncated sequence becomes U+FFFD.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn incomplete_tail_len(data: &[u8]) -> usize {
    for back in 1..=data.len().min(3) {
        let byte = data[data.len() - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let width = match byte {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}

/// Console markup for one write: a single trailing newline is dropped and
/// the remaining newlines become line breaks.
pub fn to_markup(text: &str) -> String {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.replace('\n', LINE_BREAK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_filter_spans_chunked_writes() {
        let mut filter = BomFilter::default();
        assert!(filter.strip(&[0xEF]).is_empty());
        assert!(filter.strip(&[0xBB]).is_empty());
        assert_eq!(filter.strip(&[0xBF, b'a']), b"a");
        assert_eq!(filter.remaining(), 0);
        assert_eq!(filter.strip(b"bcd"), b"bcd");
        assert_eq!(filter.strip(b""), b"");
        assert_eq!(filter.remaining(), 0);
    }

    #[test]
    fn bom_filter_drops_leading_bytes_even_without_a_bom() {
        let mut filter = BomFilter::default();
        assert_eq!(filter.strip(b"abcdef"), b"def");
    }

    #[test]
    fn decoder_joins_split_sequences() {
        let mut decoder = Utf8Decoder::default();
        let bytes = "héllo→".as_bytes();
        // cut inside the three-byte arrow
        let cut = bytes.len() - 1;
        assert_eq!(decoder.decode(&bytes[..cut]), "héllo");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(&bytes[cut..]), "→");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn finish_releases_a_truncated_tail() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&[b'a', 0xF0, 0x9F]), "a");
        assert_eq!(decoder.finish().as_deref(), Some("\u{FFFD}"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn markup_strips_one_trailing_newline() {
        assert_eq!(to_markup("hello\n"), "hello");
        assert_eq!(to_markup("hello\n\n"), "hello<br/>");
        assert_eq!(to_markup("hello"), "hello");
    }

    #[test]
    fn markup_turns_embedded_newlines_into_breaks() {
        let markup = to_markup("a\nb\nc");
        assert_eq!(markup, "a<br/>b<br/>c");
        assert_eq!(markup.matches(LINE_BREAK).count(), 2);
        assert_eq!(markup.split(LINE_BREAK).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }
}
