//! Per-page OCR records and their validating ingestion.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Pages (and chunks) with less text than this are treated as blank.
pub const BLANK_TEXT_THRESHOLD: usize = 50;

/// OCR output for a single page, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page: u32,
    pub text: String,
    pub is_blank: bool,
}

impl PageRecord {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        let text = text.into();
        let is_blank = is_short_text(&text);
        Self {
            page,
            text,
            is_blank,
        }
    }
}

/// Unvalidated page as produced by OCR or read back from disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPage {
    pub page: i64,
    pub text: String,
}

pub fn is_short_text(text: &str) -> bool {
    text.chars().count() < BLANK_TEXT_THRESHOLD
}

/// Sort pages by number and check they run 1..=N with no gaps or repeats.
pub fn ingest(mut raw: Vec<RawPage>) -> AppResult<Vec<PageRecord>> {
    raw.sort_by_key(|p| p.page);

    let mut records = Vec::with_capacity(raw.len());
    for (index, page) in raw.into_iter().enumerate() {
        if page.page < 1 {
            return Err(AppError::MalformedInput(format!(
                "page number must be positive, got {}",
                page.page
            )));
        }
        let expected = index as i64 + 1;
        if page.page < expected {
            return Err(AppError::MalformedInput(format!(
                "page {} appears more than once",
                page.page
            )));
        }
        if page.page > expected {
            return Err(AppError::MalformedInput(format!(
                "page {} is missing",
                expected
            )));
        }
        let number = u32::try_from(page.page)
            .map_err(|_| AppError::MalformedInput(format!("page {} out of range", page.page)))?;
        records.push(PageRecord::new(number, page.text));
    }
    Ok(records)
}
