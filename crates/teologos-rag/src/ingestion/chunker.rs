//! Word-window chunking with overlap

use super::parser::PageText;
use crate::error::{Error, Result};

/// First and last source page a chunk draws words from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    pub start: u32,
    pub end: u32,
}

impl PageSpan {
    /// Display section: `Página 3` or `Páginas 3-4`
    pub fn section(&self) -> String {
        if self.start == self.end {
            format!("Página {}", self.start)
        } else {
            format!("Páginas {}-{}", self.start, self.end)
        }
    }
}

/// A chunk of document text with its 0-based ordinal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub ord: u32,
    pub text: String,
    /// Known only when chunking paged text
    pub pages: Option<PageSpan>,
}

/// Splits text into overlapping windows of whitespace-delimited words.
///
/// Boundaries depend only on the text and the two counts, so re-ingesting
/// unchanged content reproduces the same chunks and ordinals.
#[derive(Debug, Clone, Copy)]
pub struct WordChunker {
    chunk_size: usize,
    overlap: usize,
}

impl WordChunker {
    /// Fails unless `overlap < chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size <= overlap {
            return Err(Error::Config(format!(
                "Invalid chunk configuration: size {} must exceed overlap {}",
                chunk_size, overlap
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk `text`; empty or all-whitespace input gives no chunks
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        self.chunk_words(&words, None)
    }

    /// Chunk pages as one running text, tagging each chunk with its page span.
    /// Boundaries match `chunk` over the pages joined by spaces.
    pub fn chunk_pages(&self, pages: &[PageText]) -> Vec<TextChunk> {
        let mut words = Vec::new();
        let mut page_map = Vec::new();
        for page in pages {
            for word in page.text.split_whitespace() {
                words.push(word);
                page_map.push(page.number);
            }
        }
        self.chunk_words(&words, Some(&page_map))
    }

    /// `page_map[i]` is the page of `words[i]`
    fn chunk_words(&self, words: &[&str], page_map: Option<&[u32]>) -> Vec<TextChunk> {
        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < words.len() {
            let end = (start + self.chunk_size).min(words.len());
            let window = words[start..end].join(" ");
            let window = window.trim();
            if !window.is_empty() {
                chunks.push(TextChunk {
                    ord: chunks.len() as u32,
                    text: window.to_string(),
                    pages: page_map.map(|map| PageSpan {
                        start: map[start],
                        end: map[end - 1],
                    }),
                });
            }
            if end == words.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_empty_input() {
        let chunker = WordChunker::new(600, 100).unwrap();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk(" \n\t ").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = WordChunker::new(600, 100).unwrap();
        let chunks = chunker.chunk(&words(50));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].ord, 0);
        assert_eq!(chunks[0].text, words(50));
    }

    #[test]
    fn test_windows_overlap() {
        let chunker = WordChunker::new(4, 1).unwrap();
        let chunks = chunker.chunk("a b c d e f g h i j");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a b c d", "d e f g", "g h i j"]);
    }

    #[test]
    fn test_stops_when_window_reaches_end() {
        let chunker = WordChunker::new(4, 1).unwrap();
        let texts: Vec<String> = chunker
            .chunk("a b c d e f g h")
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["a b c d", "d e f g", "g h"]);
    }

    #[test]
    fn test_collapses_whitespace_runs() {
        let chunker = WordChunker::new(10, 0).unwrap();
        let chunks = chunker.chunk("  graça \n\n  e   natureza ");
        assert_eq!(chunks[0].text, "graça e natureza");
    }

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_page_spans() {
        let chunker = WordChunker::new(4, 1).unwrap();
        let pages = vec![page(1, "a b c"), page(2, "d e f"), page(5, "g h i j")];
        let chunks = chunker.chunk_pages(&pages);

        let spans: Vec<(u32, u32)> = chunks
            .iter()
            .map(|c| c.pages.map(|p| (p.start, p.end)).unwrap())
            .collect();
        assert_eq!(spans, vec![(1, 2), (2, 5), (5, 5)]);
        assert_eq!(chunks[0].pages.unwrap().section(), "Páginas 1-2");
        assert_eq!(chunks[2].pages.unwrap().section(), "Página 5");
    }

    #[test]
    fn test_paged_boundaries_match_plain_text() {
        let chunker = WordChunker::new(4, 1).unwrap();
        let pages = vec![page(1, "a b c"), page(2, "d e f"), page(3, "g h i j")];
        let paged: Vec<String> = chunker.chunk_pages(&pages).into_iter().map(|c| c.text).collect();
        let plain: Vec<String> = chunker
            .chunk("a b c d e f g h i j")
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(paged, plain);
        assert!(chunker.chunk("a b").iter().all(|c| c.pages.is_none()));
        assert!(chunker.chunk_pages(&[]).is_empty());
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(WordChunker::new(100, 100), Err(Error::Config(_))));
        assert!(matches!(WordChunker::new(50, 100), Err(Error::Config(_))));
        assert!(WordChunker::new(0, 0).is_err());
    }

    proptest! {
        #[test]
        fn prop_chunking_is_deterministic(
            text in "[a-z ]{0,400}",
            size in 1usize..40,
            overlap_seed in 0usize..40,
        ) {
            let overlap = overlap_seed % size;
            let chunker = WordChunker::new(size, overlap).unwrap();
            prop_assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
        }

        #[test]
        fn prop_ordinals_are_contiguous(
            word_count in 0usize..500,
            size in 1usize..60,
            overlap_seed in 0usize..60,
        ) {
            let overlap = overlap_seed % size;
            let chunks = WordChunker::new(size, overlap).unwrap().chunk(&words(word_count));
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.ord as usize, i);
            }
            prop_assert_eq!(chunks.is_empty(), word_count == 0);
        }

        #[test]
        fn prop_every_word_is_covered(
            word_count in 1usize..300,
            size in 1usize..50,
            overlap_seed in 0usize..50,
        ) {
            let overlap = overlap_seed % size;
            let chunks = WordChunker::new(size, overlap).unwrap().chunk(&words(word_count));
            let last = chunks.last().unwrap();
            let tail = format!("w{}", word_count - 1);
            prop_assert!(last.text.ends_with(&tail));
            prop_assert!(chunks[0].text.starts_with("w0"));
            for chunk in &chunks {
                prop_assert!(chunk.text.split(' ').count() <= size);
            }
        }

        #[test]
        fn prop_overlap_not_below_size_fails(size in 0usize..100, extra in 0usize..100) {
            prop_assert!(WordChunker::new(size, size + extra).is_err());
        }
    }
}
