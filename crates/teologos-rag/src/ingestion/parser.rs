//! PDF text extraction, page by page

use async_trait::async_trait;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{Error, Result};

/// Text of one page, whitespace collapsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number in the source file
    pub number: u32,
    pub text: String,
}

/// Trait for turning an uploaded file into per-page plain text
///
/// Implementations:
/// - `PdfTextExtractor`: pdf-extract with an lopdf content-stream fallback
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Pages that carry text, in page order. No pages is not an error.
    async fn extract(&self, filename: &str, data: Vec<u8>) -> Result<Vec<PageText>>;
}

/// Collapse every whitespace run to one space and trim
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number raw page texts from 1, dropping pages left blank after normalization
fn numbered_pages<I>(raw_pages: I) -> Vec<PageText>
where
    I: IntoIterator<Item = (u32, String)>,
{
    raw_pages
        .into_iter()
        .filter_map(|(number, raw)| {
            let text = normalize_whitespace(&raw.replace('\0', ""));
            (!text.is_empty()).then_some(PageText { number, text })
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// PDF extractor running on the blocking pool
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    /// Synchronous extraction
    pub fn extract_blocking(filename: &str, data: &[u8]) -> Result<Vec<PageText>> {
        let pages = match Self::extract_primary(data) {
            Ok(raw_pages) => numbered_pages((1u32..).zip(raw_pages)),
            Err(reason) => {
                tracing::warn!("pdf-extract failed on {}: {}, trying fallback", filename, reason);
                Self::extract_fallback(filename, data)?
            }
        };

        if pages.is_empty() {
            tracing::warn!("No text extracted from {}; it may be image-based", filename);
        }
        Ok(pages)
    }

    /// pdf-extract panics on some malformed fonts and resources; those become errors
    fn extract_primary(data: &[u8]) -> std::result::Result<Vec<String>, String> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(data)
        }));
        match outcome {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
        }
    }

    /// Walk each page's content stream with lopdf and collect `Tj`/`TJ` strings
    fn extract_fallback(filename: &str, data: &[u8]) -> Result<Vec<PageText>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::validation(format!("Could not read PDF {}: {}", filename, e)))?;

        let mut raw_pages = Vec::new();
        for (page_num, page_id) in doc.get_pages() {
            match doc.get_page_content(page_id) {
                Ok(content) => raw_pages.push((page_num, text_from_content_stream(&content))),
                Err(e) => {
                    tracing::debug!("Could not get content for page {}: {}", page_num, e);
                }
            }
        }
        Ok(numbered_pages(raw_pages))
    }
}

/// Literal strings shown between `BT` and `ET` operators
fn text_from_content_stream(content: &[u8]) -> String {
    let content = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content.lines() {
        let line = line.trim();
        match line {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                text.push(' ');
            }
            _ if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) => {
                if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
                    if start < end {
                        text.push_str(&unescape_pdf_string(&line[start + 1..end]));
                    }
                }
            }
            _ => {}
        }
    }

    text
}

fn unescape_pdf_string(raw: &str) -> String {
    raw.replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
        .replace("\\(", "(")
        .replace("\\)", ")")
        .replace("\\\\", "\\")
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, filename: &str, data: Vec<u8>) -> Result<Vec<PageText>> {
        let filename = filename.to_string();
        tokio::task::spawn_blocking(move || Self::extract_blocking(&filename, &data))
            .await
            .map_err(|e| Error::internal(format!("PDF extraction task failed: {}", e)))?
    }
}
