//! Document ingestion: PDF text extraction, chunking and indexing

pub mod chunker;
pub mod parser;
pub mod pipeline;

pub use chunker::{PageSpan, TextChunk, WordChunker};
pub use parser::{normalize_whitespace, PageText, PdfTextExtractor, TextExtractor};
pub use pipeline::{IngestPipeline, IngestRequest};
