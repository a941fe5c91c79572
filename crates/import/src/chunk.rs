use serde::{Deserialize, Serialize};

/// Fraction of the chunk size the soft boundary may backtrack.
const MAX_BACKTRACK: f32 = 0.2;

/// A positional window of normalized text sent to the AI tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub chunk_id: String,
    pub chunk_index: usize,
    pub text: String,
    /// Always 0: chunks are cut from the concatenated document text.
    pub page_index: usize,
    /// Character offsets into the source text, `start..end`.
    pub start: usize,
    pub end: usize,
}

/// Split `text` into overlapping windows of at most `chunk_size` characters.
///
/// A window prefers to end at whitespace within the last 20% of its span.
/// Consecutive windows share `overlap` characters; when `overlap` would stop
/// the cursor from advancing, the next window starts where the last ended.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
    let chars: Vec<char> = text.chars().collect();
    let size = chunk_size.max(1);
    let min_end_offset = size - ((size as f32 * MAX_BACKTRACK) as usize).min(size - 1);

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + size).min(chars.len());

        if end < chars.len() {
            let floor = start + min_end_offset;
            if let Some(space) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = space;
            }
        }

        let chunk_index = chunks.len();
        chunks.push(TextChunk {
            chunk_id: format!("chunk-{chunk_index}"),
            chunk_index,
            text: chars[start..end].iter().collect(),
            page_index: 0,
            start,
            end,
        });

        if end >= chars.len() {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(text: &str, chunks: &[TextChunk]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for c in chunks {
            let skip = covered - c.start;
            out.extend(c.text.chars().skip(skip));
            covered = c.end;
        }
        assert_eq!(covered, text.chars().count());
        out
    }

    fn statement(lines: usize) -> String {
        (0..lines)
            .map(|i| format!("2025-08-{:02} UPI/Merchant {i} {}.00(Dr) 9{i}1.54(Cr)", i % 28 + 1, i * 7))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("hello world", 2000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].chunk_id, "chunk-0");
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text("", 100, 10).is_empty());
    }

    #[test]
    fn chunks_overlap_and_reassemble() {
        let text = statement(120);
        let chunks = chunk_text(&text, 500, 50);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(pair[1].start < pair[0].end, "windows must overlap");
            assert!(pair[1].start > pair[0].start, "windows must advance");
        }
        assert_eq!(reassemble(&text, &chunks), text);
    }

    #[test]
    fn chunks_respect_size_and_cut_at_whitespace() {
        let text = statement(80);
        let chunks = chunk_text(&text, 300, 30);
        for c in &chunks[..chunks.len() - 1] {
            assert!(c.text.chars().count() <= 300);
            assert!(c.text.chars().count() >= 240);
            let next = text.chars().nth(c.end).unwrap();
            assert!(next.is_whitespace(), "cut mid-token at {}", c.end);
        }
    }

    #[test]
    fn no_whitespace_falls_back_to_hard_cut() {
        let text = "x".repeat(1000);
        let chunks = chunk_text(&text, 300, 0);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].text.len(), 300);
        assert_eq!(reassemble(&text, &chunks), text);
    }

    #[test]
    fn terminates_when_overlap_exceeds_size() {
        let text = statement(20);
        for (size, overlap) in [(50, 50), (50, 80), (1, 5), (0, 0), (10, usize::MAX)] {
            let chunks = chunk_text(&text, size, overlap);
            assert_eq!(reassemble(&text, &chunks), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "₹500 paid to रवि ".repeat(40);
        let chunks = chunk_text(&text, 64, 8);
        assert_eq!(reassemble(&text, &chunks), text);
    }
}
