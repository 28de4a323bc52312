//! Splits scanned oil-trading PDF bundles into one named PDF per document.
//!
//! Pages are OCR'd, grouped into chunks by their position in the bundle, sent
//! to a local model for field extraction, and written back out as separate
//! files named after what the model found.

pub mod error;
pub mod ocr;
pub mod ollama;
pub mod oracle;
pub mod pages;
pub mod parser;
pub mod partition;
pub mod pdf_writer;
pub mod pipeline;
pub mod processor;
pub mod render;
pub mod segmenter;
pub mod settings;
mod tools;
pub mod workspace;

pub use error::{AppError, AppResult};
pub use oracle::{CallPolicy, ExtractionOracle, OracleAdapter};
pub use pages::{ingest, PageRecord, RawPage, BLANK_TEXT_THRESHOLD};
pub use parser::{extract_json_object, parse_fields, ExtractedFields};
pub use partition::{output_file_name, partition, PartitionReport, PdfWriter};
pub use pipeline::{ExtractedRecord, ExtractionOutcome, ExtractionPipeline, FailureEntry};
pub use processor::DocumentProcessor;
pub use segmenter::{segment, Chunk, TypeHint};
pub use settings::{load_settings, save_settings, Settings};
pub use workspace::{RunReport, Workspace};
