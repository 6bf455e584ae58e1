//! Result types returned by [`crate::extract::extract`].

use serde::{Deserialize, Serialize};

/// Recognised text for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 0-based page index in the source PDF.
    pub index: usize,
    /// Text exactly as the OCR engine produced it.
    pub text: String,
}

/// Full extraction result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    /// All page texts joined in page order, no separator.
    pub text: String,
    /// Per-page texts, ascending by index.
    pub pages: Vec<PageText>,
    pub stats: ExtractionStats,
}

/// Timing and size figures for one extraction call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub page_count: usize,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Join page texts in ascending page order.
///
/// Pages are concatenated directly: a page whose text does not end with a
/// newline runs into the next page's first line.
pub fn concatenate(pages: &[PageText]) -> String {
    let mut sorted: Vec<&PageText> = pages.iter().collect();
    sorted.sort_by_key(|p| p.index);
    let mut out = String::with_capacity(sorted.iter().map(|p| p.text.len()).sum());
    for page in sorted {
        out.push_str(&page.text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(index: usize, text: &str) -> PageText {
        PageText {
            index,
            text: text.to_string(),
        }
    }

    #[test]
    fn concatenates_by_index_without_separator() {
        let pages = vec![page(2, "C"), page(0, "A"), page(1, "B")];
        assert_eq!(concatenate(&pages), "ABC");
    }

    #[test]
    fn keeps_whitespace_verbatim() {
        let pages = vec![page(0, "  line one"), page(1, "line two\n\x0c")];
        assert_eq!(concatenate(&pages), "  line oneline two\n\x0c");
    }

    #[test]
    fn empty_input_gives_empty_string() {
        assert_eq!(concatenate(&[]), "");
    }
}
