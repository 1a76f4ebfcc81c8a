//! Overlapping character-window splitter.
//!
//! Long document text is cut into chunks of at most `max_chars` characters,
//! each chunk after the first repeating the last `overlap` characters of its
//! predecessor. Cuts prefer a paragraph break, then a sentence or line break,
//! before falling back to a hard cut at the size limit. The overlap window is
//! what keeps facts that straddle a chunk boundary retrievable.

use crate::types::PipelineError;

/// Splits text into bounded, overlapping chunks.
#[derive(Clone, Copy, Debug)]
pub struct TextSplitter {
    max_chars: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Creates a splitter; `overlap` must be strictly smaller than `max_chars`.
    pub fn new(max_chars: usize, overlap: usize) -> Result<Self, PipelineError> {
        if max_chars == 0 || overlap >= max_chars {
            return Err(PipelineError::Config(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({max_chars})"
            )));
        }
        Ok(Self { max_chars, overlap })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Returns a lazy iterator over the chunks of `text`.
    ///
    /// Empty input yields no chunks. The iterator is cheap to clone, which
    /// restarts iteration from the beginning.
    pub fn split<'a>(&self, text: &'a str) -> Chunks<'a> {
        let mut offsets = Vec::with_capacity(text.len());
        let mut chars = Vec::with_capacity(text.len());
        for (offset, ch) in text.char_indices() {
            offsets.push(offset);
            chars.push(ch);
        }
        Chunks {
            text,
            offsets,
            chars,
            start: 0,
            max_chars: self.max_chars,
            overlap: self.overlap,
        }
    }

    /// Collects the chunks into owned strings.
    pub fn split_to_vec(&self, text: &str) -> Vec<String> {
        self.split(text).map(str::to_owned).collect()
    }
}

/// Lazy chunk iterator produced by [`TextSplitter::split`].
#[derive(Clone, Debug)]
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of each char; `text.len()` is the implicit final entry.
    offsets: Vec<usize>,
    chars: Vec<char>,
    /// Char index where the next chunk begins.
    start: usize,
    max_chars: usize,
    overlap: usize,
}

impl<'a> Chunks<'a> {
    fn byte_at(&self, char_index: usize) -> usize {
        if char_index == self.chars.len() {
            self.text.len()
        } else {
            self.offsets[char_index]
        }
    }

    /// Picks the cut point for a non-final chunk ending no later than
    /// `hard_end`. The floor `start + overlap + 1` guarantees forward
    /// progress and a full overlap window for the next chunk.
    fn cut_point(&self, hard_end: usize) -> usize {
        let floor = self.start + self.overlap + 1;

        for end in (floor..=hard_end).rev() {
            if self.chars[end - 1] == '\n' && end >= 2 && self.chars[end - 2] == '\n' {
                return end;
            }
        }
        for end in (floor..=hard_end).rev() {
            if matches!(self.chars[end - 1], '\n' | '.' | '!' | '?') {
                return end;
            }
        }
        hard_end
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let total = self.chars.len();
        if self.start >= total {
            return None;
        }

        let hard_end = (self.start + self.max_chars).min(total);
        let end = if hard_end == total {
            total
        } else {
            self.cut_point(hard_end)
        };

        let chunk = &self.text[self.byte_at(self.start)..self.byte_at(end)];
        self.start = if end == total { total } else { end - self.overlap };
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (index, chunk) in chunks.iter().enumerate() {
            if index == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn empty_input_yields_zero_chunks() {
        let splitter = TextSplitter::new(100, 10).unwrap();
        assert!(splitter.split_to_vec("").is_empty());
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let splitter = TextSplitter::new(100, 10).unwrap();
        let chunks = splitter.split_to_vec("short text");
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn chunks_respect_the_size_bound() {
        let splitter = TextSplitter::new(50, 5).unwrap();
        let text = "word ".repeat(100);
        for chunk in splitter.split(&text) {
            assert!(chunk.chars().count() <= 50);
        }
    }

    #[test]
    fn trimming_the_overlap_reconstructs_the_input() {
        let splitter = TextSplitter::new(40, 8).unwrap();
        let text = "Sentence one. Sentence two is longer.\n\nA new paragraph starts here \
                    and keeps going for a while. Final words!";
        let chunks = splitter.split_to_vec(text);
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks, 8), text);
    }

    #[test]
    fn reconstruction_holds_for_multibyte_text() {
        let splitter = TextSplitter::new(12, 3).unwrap();
        let text = "数据很重要。审计师辞职了。原因是审计费用分歧。更多细节在公告里。";
        let chunks = splitter.split_to_vec(text);
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks, 3), text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 12);
        }
    }

    #[test]
    fn paragraph_breaks_are_preferred_cut_points() {
        let splitter = TextSplitter::new(30, 4).unwrap();
        let text = "First paragraph here.\n\nSecond paragraph follows with more text than fits.";
        let chunks = splitter.split_to_vec(text);
        assert!(chunks[0].ends_with("\n\n"), "chunk was {:?}", chunks[0]);
    }

    #[test]
    fn each_chunk_starts_with_its_predecessors_tail() {
        let splitter = TextSplitter::new(25, 6).unwrap();
        let text = "abcdefghij ".repeat(20);
        let chunks = splitter.split_to_vec(&text);
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .chars()
                .skip(pair[0].chars().count() - 6)
                .collect();
            let head: String = pair[1].chars().take(6).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(TextSplitter::new(10, 10).is_err());
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(10, 9).is_ok());
    }

    #[test]
    fn iterator_clone_restarts_from_the_beginning() {
        let splitter = TextSplitter::new(20, 4).unwrap();
        let text = "one two three four five six seven eight nine ten";
        let mut first = splitter.split(text);
        let restart = first.clone();
        first.next();
        assert_eq!(
            restart.collect::<Vec<_>>(),
            splitter.split(text).collect::<Vec<_>>()
        );
    }
}
