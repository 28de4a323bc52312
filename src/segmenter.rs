//! Groups OCR'd pages into document chunks.
//!
//! The scanned bundles this tool handles are laid out the same way every time:
//! invoices (three pages plus a separator) up to page 24, one bill of lading per
//! page up to page 38, then certificates each followed by a back page. The rule
//! below encodes exactly that layout and nothing more.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::pages::PageRecord;

pub const INVOICE_LAST_PAGE: u32 = 24;
pub const BOL_LAST_PAGE: u32 = 38;
pub const INVOICE_GROUP_SIZE: usize = 3;
const INVOICE_STRIDE: usize = 4;
const CERTIFICATE_STRIDE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeHint {
    Invoice,
    Bol,
    Certificate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: u32,
    pub type_hint: TypeHint,
    pub pages: Vec<u32>,
    pub text: String,
}

/// Result of applying the rule at one cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Type and index range (into the page slice) of the chunk to emit, if any.
    pub emit: Option<(TypeHint, Range<usize>)>,
    pub advance: usize,
}

/// Apply the segmentation rule to the page at `cursor`, or `None` past the end.
///
/// The invoice window is plain index slicing, so a group starting at page 23 or
/// 24 picks up the first bill-of-lading pages too.
pub fn step(pages: &[PageRecord], cursor: usize) -> Option<Step> {
    let page = pages.get(cursor)?;
    let step = if page.page <= INVOICE_LAST_PAGE {
        let end = (cursor + INVOICE_GROUP_SIZE).min(pages.len());
        Step {
            emit: Some((TypeHint::Invoice, cursor..end)),
            advance: INVOICE_STRIDE,
        }
    } else if page.page <= BOL_LAST_PAGE {
        Step {
            emit: Some((TypeHint::Bol, cursor..cursor + 1)),
            advance: 1,
        }
    } else if page.is_blank {
        Step {
            emit: None,
            advance: 1,
        }
    } else {
        Step {
            emit: Some((TypeHint::Certificate, cursor..cursor + 1)),
            advance: CERTIFICATE_STRIDE,
        }
    };
    Some(step)
}

/// Single pass over pages sorted by page number.
pub fn segment(pages: &[PageRecord]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut cursor = 0;
    let mut chunk_id = 1;

    while let Some(Step { emit, advance }) = step(pages, cursor) {
        if let Some((type_hint, range)) = emit {
            let members = &pages[range];
            chunks.push(Chunk {
                chunk_id,
                type_hint,
                pages: members.iter().map(|p| p.page).collect(),
                text: members
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            });
            chunk_id += 1;
        }
        cursor += advance;
    }

    log::info!("Chunking complete. Total chunks: {}", chunks.len());
    chunks
}
