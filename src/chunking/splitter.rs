//! Recursive-boundary text splitter.
//!
//! Cuts prefer paragraph breaks, then sentence ends, then word gaps, and fall
//! back to a hard cut at `chunk_size` chars. Chunks are contiguous spans of the
//! document text; consecutive chunks share at most `chunk_overlap` chars.

use super::{Chunk, Document};
use crate::error::{AifaqError, Result};
use tracing::debug;

/// A chunk-sized slice of a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Start position in chars.
    pub offset: usize,
    pub text: String,
}

impl Span {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Boundary kinds, tried from most to least coherent.
#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 3] = [Boundary::Paragraph, Boundary::Sentence, Boundary::Word];

impl Boundary {
    /// Whether a chunk ending right before `end` ends on this boundary.
    fn ends_at(self, chars: &[char], end: usize) -> bool {
        match self {
            Boundary::Paragraph => end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n',
            Boundary::Sentence => {
                end >= 2
                    && chars[end - 1].is_whitespace()
                    && matches!(chars[end - 2], '.' | '?' | '!')
            }
            Boundary::Word => end >= 1 && chars[end - 1].is_whitespace(),
        }
    }
}

/// Splits documents into overlapping chunks.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Create a splitter. `chunk_overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(AifaqError::InvalidInput(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split every document, copying its metadata onto each chunk.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (document_index, doc) in documents.iter().enumerate() {
            for (ordinal, span) in self.split_text(&doc.content).into_iter().enumerate() {
                chunks.push(Chunk {
                    text: span.text,
                    metadata: doc.metadata.clone(),
                    offset: span.offset,
                    ordinal,
                    document_index,
                });
            }
        }
        debug!("Split {} documents into {} chunks", documents.len(), chunks.len());
        chunks
    }

    /// Split a text into spans of at most `chunk_size` chars.
    pub fn split_text(&self, text: &str) -> Vec<Span> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut spans = Vec::new();
        if text.trim().is_empty() {
            return spans;
        }

        let mut start = 0;
        loop {
            if total - start <= self.chunk_size {
                spans.push(span_of(&chars, start, total));
                break;
            }

            let end = self.find_cut(&chars, start);
            spans.push(span_of(&chars, start, end));
            start = self.next_start(&chars, end);
        }

        spans
    }

    /// End of the chunk starting at `start`. Always past `start + chunk_overlap`
    /// so the following chunk makes progress.
    fn find_cut(&self, chars: &[char], start: usize) -> usize {
        let limit = start + self.chunk_size;
        let min_end = start + self.chunk_overlap + 1;

        for boundary in BOUNDARIES {
            if let Some(end) = (min_end..=limit).rev().find(|&end| boundary.ends_at(chars, end)) {
                return end;
            }
        }
        limit
    }

    /// Start of the chunk following one that ends at `end`: the first word
    /// start inside the overlap window, or the window start if there is none.
    fn next_start(&self, chars: &[char], end: usize) -> usize {
        if self.chunk_overlap == 0 {
            return end;
        }
        let window = end - self.chunk_overlap;
        (window..end)
            .find(|&i| i > 0 && chars[i - 1].is_whitespace() && !chars[i].is_whitespace())
            .unwrap_or(window)
    }
}

fn span_of(chars: &[char], start: usize, end: usize) -> Span {
    Span {
        offset: start,
        text: chars[start..end].iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{META_SOURCE, META_TITLE};

    /// Rebuild the original text from overlapping spans.
    fn reassemble(spans: &[Span]) -> String {
        let mut out: Vec<char> = Vec::new();
        for span in spans {
            let skip = out.len().saturating_sub(span.offset);
            out.extend(span.text.chars().skip(skip));
        }
        out.into_iter().collect()
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for i in 0..12 {
            text.push_str(&format!(
                "Paragraph {} explains how the accelerator supports founders. It covers mentoring, \
                 funding and the graduation requirements! Does it end here? Not quite.\n\n",
                i
            ));
        }
        text.push_str("Final line without punctuation");
        text
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 99).is_ok());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = TextSplitter::new(1000, 200).unwrap();
        let spans = splitter.split_text("Founder Institute helps startups.");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].offset, 0);
        assert_eq!(spans[0].text, "Founder Institute helps startups.");
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("   \n\n ").is_empty());
    }

    #[test]
    fn test_round_trip_and_size_bound_over_parameter_grid() {
        let texts = [
            sample_text(),
            "a".repeat(537),
            "word ".repeat(300),
            "Ünïcödé text with accents, and more. ".repeat(40),
        ];

        for text in &texts {
            for (size, overlap) in [(1, 0), (7, 3), (50, 0), (50, 49), (120, 30), (1000, 200), (333, 100)] {
                let splitter = TextSplitter::new(size, overlap).unwrap();
                let spans = splitter.split_text(text);

                assert_eq!(&reassemble(&spans), text, "size={} overlap={}", size, overlap);
                for span in &spans {
                    assert!(span.char_len() <= size, "size={} overlap={}", size, overlap);
                }
                for pair in spans.windows(2) {
                    let prev_end = pair[0].offset + pair[0].char_len();
                    assert!(pair[1].offset > pair[0].offset);
                    assert!(prev_end - pair[1].offset <= overlap);
                }
            }
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let splitter = TextSplitter::new(60, 0).unwrap();
        let text = "First paragraph is short.\n\nSecond paragraph is also short enough.";
        let spans = splitter.split_text(text);
        assert_eq!(spans[0].text, "First paragraph is short.\n\n");
        assert_eq!(spans[1].text, "Second paragraph is also short enough.");
    }

    #[test]
    fn test_prefers_sentence_over_word() {
        let splitter = TextSplitter::new(40, 0).unwrap();
        let spans = splitter.split_text("One sentence here. Another one follows it closely");
        assert_eq!(spans[0].text, "One sentence here. ");
    }

    #[test]
    fn test_overlap_starts_on_word_boundary() {
        let splitter = TextSplitter::new(30, 10).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let spans = splitter.split_text(text);
        assert!(spans.len() > 1);
        for span in &spans[1..] {
            let chars: Vec<char> = text.chars().collect();
            assert!(chars[span.offset - 1].is_whitespace());
        }
    }

    #[test]
    fn test_chunk_documents_copies_metadata() {
        let splitter = TextSplitter::new(40, 5).unwrap();
        let docs = vec![
            Document::new("Short doc.", "a.txt"),
            Document::new("word ".repeat(30), "b.html").with_meta(META_TITLE, "B"),
        ];

        let chunks = splitter.chunk_documents(&docs);
        assert_eq!(chunks[0].document_index, 0);
        assert_eq!(chunks[0].metadata.get(META_SOURCE).unwrap(), "a.txt");

        let b_chunks: Vec<_> = chunks.iter().filter(|c| c.document_index == 1).collect();
        assert!(b_chunks.len() > 1);
        for (i, chunk) in b_chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert_eq!(chunk.metadata.get(META_TITLE).unwrap(), "B");
        }
    }
}
