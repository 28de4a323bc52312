//! lopdf-backed page extraction, plus the record metadata stored in each output
//!
//! The extracted fields are kept in the Info dictionary of every split PDF so a
//! file can be traced back to its chunk without the JSON artifacts.

use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::error::{AppError, AppResult};
use crate::partition::PdfWriter;
use crate::pipeline::ExtractedRecord;

const RECORD_KEY: &[u8] = b"OilsplitRecord";
const VERSION_KEY: &[u8] = b"OilsplitVersion";
/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

pub struct LopdfWriter {
    source: Document,
    page_count: u32,
}

impl LopdfWriter {
    pub fn open(pdf_path: &Path) -> AppResult<Self> {
        let source = Document::load(pdf_path)?;
        Ok(Self::from_document(source))
    }

    pub fn from_document(source: Document) -> Self {
        let page_count = source.get_pages().len() as u32;
        Self { source, page_count }
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    fn check_pages(&self, pages: &[u32]) -> AppResult<()> {
        if pages.is_empty() {
            return Err(AppError::OutputWrite("no pages requested".to_string()));
        }
        if let Some(&bad) = pages.iter().find(|&&p| p == 0 || p > self.page_count) {
            return Err(AppError::OutputWrite(format!(
                "page {} is outside the source document (1-{})",
                bad, self.page_count
            )));
        }
        let mut sorted = pages.to_vec();
        sorted.sort_unstable();
        if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(AppError::OutputWrite(format!(
                "page {} requested more than once",
                w[0]
            )));
        }
        Ok(())
    }
}

impl PdfWriter for LopdfWriter {
    type Document = Document;

    fn extract_pages(&self, pages: &[u32]) -> AppResult<Document> {
        self.check_pages(pages)?;

        let mut doc = self.source.clone();
        let unwanted: Vec<u32> = (1..=self.page_count)
            .filter(|p| !pages.contains(p))
            .collect();
        doc.delete_pages(&unwanted);
        if !pages.windows(2).all(|w| w[0] < w[1]) {
            reorder_pages(&mut doc, pages)?;
        }
        doc.prune_objects();
        Ok(doc)
    }

    fn annotate(&self, document: &mut Document, record: &ExtractedRecord) -> AppResult<()> {
        let json = serde_json::to_string(record)?;
        let info_id = info_dictionary_id(document);

        if let Ok(Object::Dictionary(ref mut info)) = document.get_object_mut(info_id) {
            info.set(
                RECORD_KEY,
                Object::String(base64_encode(&json).into_bytes(), StringFormat::Literal),
            );
            info.set(
                VERSION_KEY,
                Object::String(b"1.0".to_vec(), StringFormat::Literal),
            );
            if !record.fields.document_type.is_empty() {
                info.set(
                    "Subject",
                    Object::string_literal(record.fields.document_type.as_str()),
                );
            }
        }
        Ok(())
    }

    fn save(&self, document: &mut Document, path: &Path) -> AppResult<()> {
        document
            .save(path)
            .map_err(|e| AppError::OutputWrite(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }
}

/// Rebuild the page tree as a single level listing pages in `order`.
///
/// `doc` must hold exactly the pages named in `order`, renumbered from 1 in
/// ascending source order.
fn reorder_pages(doc: &mut Document, order: &[u32]) -> AppResult<()> {
    let mut ascending = order.to_vec();
    ascending.sort_unstable();
    let remaining: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if remaining.len() != ascending.len() {
        return Err(AppError::OutputWrite(format!(
            "expected {} pages after extraction, found {}",
            ascending.len(),
            remaining.len()
        )));
    }

    let kids: Vec<ObjectId> = order
        .iter()
        .filter_map(|p| ascending.binary_search(p).ok())
        .map(|index| remaining[index])
        .collect();
    let root_id = doc.catalog()?.get(b"Pages")?.as_reference()?;
    for &page_id in &kids {
        flatten_inherited(doc, page_id, root_id)?;
    }

    let root = doc.get_dictionary_mut(root_id)?;
    root.set(
        "Kids",
        Object::Array(kids.iter().map(|&id| Object::Reference(id)).collect()),
    );
    root.set("Count", Object::Integer(kids.len() as i64));
    Ok(())
}

/// Copy inherited attributes onto the page and hang it directly off `root_id`.
fn flatten_inherited(doc: &mut Document, page_id: ObjectId, root_id: ObjectId) -> AppResult<()> {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();
    let mut parent = doc
        .get_dictionary(page_id)?
        .get(b"Parent")
        .and_then(Object::as_reference)
        .ok();
    let mut depth = 0;
    while let Some(node_id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            return Err(AppError::OutputWrite("page tree is too deep".to_string()));
        }
        let node = doc.get_dictionary(node_id)?;
        for key in INHERITABLE_KEYS {
            if let Ok(value) = node.get(key) {
                inherited.push((key, value.clone()));
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    let page = doc.get_dictionary_mut(page_id)?;
    // Nearest ancestor first, so it wins over anything further up.
    for (key, value) in inherited {
        if !page.has(key) {
            page.set(key, value);
        }
    }
    page.set("Parent", Object::Reference(root_id));
    Ok(())
}

fn info_dictionary_id(doc: &mut Document) -> ObjectId {
    if let Some(info_ref) = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|o| o.as_reference().ok())
    {
        return info_ref;
    }
    let info_id = doc.add_object(Object::Dictionary(Dictionary::new()));
    doc.trailer.set("Info", Object::Reference(info_id));
    info_id
}

/// Read back the record stored in a split PDF, if any.
pub fn read_record_from_pdf(pdf_path: &Path) -> Option<ExtractedRecord> {
    let doc = Document::load(pdf_path).ok()?;
    let info_ref = doc.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = doc.get_dictionary(info_ref).ok()?;

    match info.get(RECORD_KEY).ok()? {
        Object::String(bytes, _) => String::from_utf8(bytes.clone())
            .ok()
            .and_then(|s| base64_decode(&s))
            .and_then(|json| serde_json::from_str(&json).ok()),
        _ => None,
    }
}

fn base64_encode(s: &str) -> String {
    general_purpose::STANDARD.encode(s)
}

fn base64_decode(s: &str) -> Option<String> {
    general_purpose::STANDARD
        .decode(s)
        .ok()
        .and_then(|v| String::from_utf8(v).ok())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{dictionary, Document, Object};

    /// A document of `count` empty pages; page N is `100 + N` points wide.
    pub fn numbered_pages(count: u32) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (1..=count)
            .map(|n| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(100 + n as i64),
                        Object::Integer(100),
                    ],
                })
                .into()
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    /// Widths of the pages, which identify the original page numbers.
    pub fn page_widths(doc: &Document) -> Vec<i64> {
        doc.get_pages()
            .values()
            .map(|&id| {
                let page = doc.get_dictionary(id).unwrap();
                page.get(b"MediaBox").unwrap().as_array().unwrap()[2]
                    .as_i64()
                    .unwrap()
            })
            .collect()
    }
}
