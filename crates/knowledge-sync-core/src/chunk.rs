//! Sentence-aligned, overlapping text chunker.
//!
//! Splits extracted document text into windows bounded by `max_chars`.
//! Chunk boundaries always fall between sentences (or inside a sentence
//! that is itself longer than the budget), and each chunk after the first
//! starts with the tail of its predecessor so context survives the cut.
//!
//! # Algorithm
//!
//! 1. Split the text into sentences: a boundary follows `.`, `!` or `?`
//!    when the next character is whitespace, and every blank line is a
//!    boundary too.
//! 2. If there is only one sentence, return it truncated to `max_chars`.
//! 3. Hard-split any sentence longer than `max_chars` at its last
//!    whitespace before the limit.
//! 4. Pack sentences greedily into a buffer, joined by single spaces.
//! 5. When the next sentence does not fit, close the buffer and seed the
//!    next one with the trailing `overlap` characters of the closed chunk
//!    (shrunk so that seed and sentence fit together).
//!
//! Lengths are counted in `char`s, never bytes. The output depends only on
//! the input, which is what makes chunk digests usable for change
//! detection.
//!
//! # Example
//!
//! ```rust
//! use knowledge_sync_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("Hello world. Second sentence.", 800, 100);
//! assert_eq!(chunks, vec!["Hello world. Second sentence.".to_string()]);
//! ```

/// Split `text` into overlapping, sentence-aligned chunks of at most
/// `max_chars` characters.
///
/// # Guarantees
///
/// - Whitespace-only input yields no chunks; any other input yields at
///   least one.
/// - No chunk exceeds `max_chars` characters.
/// - Identical input always yields an identical chunk list.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let sentences = split_sentences(trimmed);
    if sentences.len() <= 1 {
        return vec![truncate_chars(trimmed, max_chars).to_string()];
    }

    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for piece in sentences.iter().flat_map(|s| hard_split(s, max_chars)) {
        let piece_len = piece.chars().count();

        if buf.is_empty() {
            buf.push_str(piece);
            buf_len = piece_len;
            continue;
        }

        if buf_len + 1 + piece_len <= max_chars {
            buf.push(' ');
            buf.push_str(piece);
            buf_len += 1 + piece_len;
            continue;
        }

        let room = max_chars.saturating_sub(piece_len + 1);
        let seed = tail_chars(&buf, overlap.min(room)).trim_start().to_string();
        chunks.push(std::mem::take(&mut buf));

        if seed.is_empty() {
            buf.push_str(piece);
        } else {
            buf = format!("{} {}", seed, piece);
        }
        buf_len = buf.chars().count();
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }

    chunks
}

/// Split text into trimmed, non-empty sentences.
///
/// A sentence ends after terminal punctuation (`.`, `!`, `?`) followed by
/// whitespace, or at a blank line.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let end = match c {
            '.' | '!' | '?' => match chars.peek() {
                Some(&(_, next)) if next.is_whitespace() => Some(i + c.len_utf8()),
                _ => None,
            },
            '\n' => {
                let rest = &text[i + 1..];
                let after_ws = rest.trim_start_matches(|ch: char| ch == ' ' || ch == '\t' || ch == '\r');
                if after_ws.starts_with('\n') {
                    Some(i)
                } else {
                    None
                }
            }
            _ => None,
        };

        if let Some(end) = end {
            let piece = text[start..end].trim();
            if !piece.is_empty() {
                sentences.push(piece);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Break a single over-long sentence into pieces of at most `max_chars`,
/// preferring whitespace boundaries.
fn hard_split(sentence: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut remaining = sentence;

    while !remaining.is_empty() {
        let cut = match remaining.char_indices().nth(max_chars) {
            Some((byte, _)) => byte,
            None => {
                pieces.push(remaining);
                break;
            }
        };
        let split_at = match remaining[..cut].rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => pos,
            _ => cut,
        };
        let piece = remaining[..split_at].trim_end();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        remaining = remaining[split_at..].trim_start();
    }

    pieces
}

/// The last `n` characters of `s`.
pub fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let count = s.chars().count();
    if n >= count {
        return s;
    }
    let start = s
        .char_indices()
        .nth(count - n)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    &s[start..]
}

/// The first `n` characters of `s`.
pub fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
