//! Splits extracted text into overlapping fixed-size windows, the unit of
//! retrieval.

/// Returned when `overlap >= chunk_size`; stepping by `chunk_size - overlap`
/// would never advance.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid chunk config: overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
pub struct InvalidChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

/// Splits `text` into windows of `chunk_size` characters, consecutive windows
/// sharing `overlap` characters. Windows are taken left to right; the final
/// window is clamped to the end of the text. Empty text yields no chunks.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, InvalidChunkConfig> {
    if overlap >= chunk_size {
        return Err(InvalidChunkConfig {
            chunk_size,
            overlap,
        });
    }

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_windows() {
        let chunks = chunk_text("abcdefghij", 4, 1).unwrap();
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 500, 50).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_yields_one_chunk() {
        let chunks = chunk_text("abc", 10, 5).unwrap();
        assert_eq!(chunks, vec!["abc"]);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        assert!(chunk_text("abcdef", 4, 4).is_err());
        assert!(chunk_text("abcdef", 4, 9).is_err());
        let err = chunk_text("abcdef", 3, 3).unwrap_err();
        assert_eq!(
            err,
            InvalidChunkConfig {
                chunk_size: 3,
                overlap: 3
            }
        );
    }

    #[test]
    fn test_chunk_count_matches_window_arithmetic() {
        for (len, size, overlap) in [(10, 4, 1), (100, 40, 10), (40, 40, 10), (41, 40, 10)] {
            let text: String = std::iter::repeat('x').take(len).collect();
            let chunks = chunk_text(&text, size, overlap).unwrap();
            let expected = (len - overlap).div_ceil(size - overlap);
            assert_eq!(chunks.len(), expected, "len={len} size={size} overlap={overlap}");
        }
    }

    #[test]
    fn test_all_but_last_chunk_are_full_length() {
        let text: String = ('a'..='z').cycle().take(137).collect();
        let chunks = chunk_text(&text, 50, 10).unwrap();
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.chars().count(), 50);
        }
    }

    #[test]
    fn test_windows_reconstruct_original_text() {
        let text: String = ('a'..='z').cycle().take(137).collect();
        let (size, overlap) = (50, 10);
        let chunks = chunk_text(&text, size, overlap).unwrap();

        let step = size - overlap;
        let mut rebuilt = String::new();
        for chunk in &chunks[..chunks.len() - 1] {
            rebuilt.extend(chunk.chars().take(step));
        }
        rebuilt.push_str(chunks.last().unwrap());
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld, çà va très bien aujourd'hui";
        let chunks = chunk_text(text, 8, 2).unwrap();
        let total: usize = text.chars().count();
        assert_eq!(chunks[0].chars().count(), 8);
        assert!(chunks.len() >= total / 8);
    }
}
