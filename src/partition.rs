//! Writes one PDF per extracted record, named after its metadata.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::pipeline::ExtractedRecord;

pub const DEFAULT_FILE_STEM: &str = "document";
pub const OUTPUT_EXTENSION: &str = ".pdf";
const ILLEGAL_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Builds and saves sub-documents of one source PDF.
pub trait PdfWriter {
    type Document;

    /// New document holding exactly these 1-based pages of the source, in the
    /// order listed.
    fn extract_pages(&self, pages: &[u32]) -> AppResult<Self::Document>;

    /// Attach the record's fields to the document before it is saved.
    fn annotate(&self, _document: &mut Self::Document, _record: &ExtractedRecord) -> AppResult<()> {
        Ok(())
    }

    fn save(&self, document: &mut Self::Document, path: &Path) -> AppResult<()>;
}

#[derive(Debug, Default)]
pub struct PartitionReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<(u32, String)>,
}

pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c))
        .collect();
    if cleaned.is_empty() {
        DEFAULT_FILE_STEM.to_string()
    } else {
        cleaned
    }
}

pub fn output_file_name(record: &ExtractedRecord) -> String {
    let raw = if record.fields.suggested_filename.is_empty() {
        let doc_type = match record.fields.document_type.as_str() {
            "" => "unknown".to_string(),
            t => t.to_lowercase().replace(' ', "_"),
        };
        format!("{}_{}", doc_type, record.chunk_id)
    } else {
        record.fields.suggested_filename.clone()
    };

    let mut name = sanitize_filename(&raw);
    if !name.ends_with(OUTPUT_EXTENSION) {
        name.push_str(OUTPUT_EXTENSION);
    }
    name
}

/// Save every record's pages under `out_dir`.
///
/// Records that map to the same file name overwrite each other; the last one
/// in the list wins.
pub fn partition<W: PdfWriter>(
    records: &[ExtractedRecord],
    writer: &W,
    out_dir: &Path,
) -> AppResult<PartitionReport> {
    fs::create_dir_all(out_dir)?;
    let mut report = PartitionReport::default();

    for record in records {
        let filename = output_file_name(record);
        let output_path = out_dir.join(&filename);

        match write_one(record, writer, &output_path) {
            Ok(()) => {
                log::info!("Saved: {} ({} pages)", filename, record.pages.len());
                report.written.push(output_path);
            }
            Err(e) => {
                log::error!("Failed to save {}: {}", filename, e);
                report.failures.push((record.chunk_id, e.to_string()));
            }
        }
    }

    log::info!(
        "PDF splitting complete. Files saved in: {}",
        out_dir.display()
    );
    Ok(report)
}

fn write_one<W: PdfWriter>(record: &ExtractedRecord, writer: &W, path: &Path) -> AppResult<()> {
    let mut document = writer.extract_pages(&record.pages).map_err(into_write_error)?;
    writer
        .annotate(&mut document, record)
        .map_err(into_write_error)?;
    writer.save(&mut document, path).map_err(into_write_error)
}

fn into_write_error(e: AppError) -> AppError {
    match e {
        AppError::OutputWrite(_) => e,
        other => AppError::OutputWrite(other.to_string()),
    }
}
