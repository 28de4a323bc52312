//! The five stages of a run, each reading and writing workspace artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppResult;
use crate::ocr::{OcrEngine, TesseractEngine};
use crate::ollama::OllamaOracle;
use crate::oracle::{ExtractionOracle, OracleAdapter};
use crate::pages::{ingest, PageRecord, RawPage};
use crate::partition::{partition, PartitionReport, PdfWriter};
use crate::pdf_writer::LopdfWriter;
use crate::pipeline::{ExtractedRecord, ExtractionOutcome, ExtractionPipeline};
use crate::render::{page_number_from_image_name, PageImage, PdftoppmRenderer, Renderer};
use crate::segmenter::{segment, Chunk};
use crate::settings::Settings;
use crate::workspace::{load_json, save_json, RunReport, Workspace};

pub struct DocumentProcessor {
    pub pdf_path: PathBuf,
    pub workspace: Workspace,
    pub settings: Settings,
}

impl DocumentProcessor {
    pub fn new(pdf_path: impl Into<PathBuf>, workspace: Workspace, settings: Settings) -> Self {
        Self {
            pdf_path: pdf_path.into(),
            workspace,
            settings,
        }
    }

    pub fn convert_pdf_to_images<R: Renderer>(&self, renderer: &R) -> AppResult<Vec<PageImage>> {
        self.workspace.ensure_dirs()?;
        let images = renderer.render(&self.pdf_path, &self.workspace.image_dir())?;
        log::info!("Rendered {} pages", images.len());
        Ok(images)
    }

    /// OCR every rendered page. An OCR failure aborts the stage.
    pub fn perform_ocr<E: OcrEngine>(&self, engine: &E) -> AppResult<Vec<PageRecord>> {
        self.workspace.ensure_dirs()?;
        let images = list_page_images(&self.workspace.image_dir())?;

        let mut raw = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            let text = engine.recognize(&image.path)?;
            raw.push(RawPage {
                page: i64::from(image.page),
                text,
            });
            if (i + 1) % 10 == 0 {
                log::info!("OCR progress: {}/{} pages", i + 1, images.len());
            }
        }

        let pages = ingest(raw)?;
        for page in &pages {
            self.workspace.write_page_text(page)?;
        }
        save_json(&self.workspace.ocr_json_path(), &pages)?;
        log::info!("OCR complete for {} pages", pages.len());
        Ok(pages)
    }

    pub fn chunk_documents(&self) -> AppResult<Vec<Chunk>> {
        let raw: Vec<RawPage> = load_json(&self.workspace.ocr_json_path())?;
        let pages = ingest(raw)?;
        let chunks = segment(&pages);
        save_json(&self.workspace.chunks_path(), &chunks)?;
        Ok(chunks)
    }

    pub async fn parse_chunks<O: ExtractionOracle>(&self, oracle: O) -> AppResult<ExtractionOutcome> {
        let chunks: Vec<Chunk> = load_json(&self.workspace.chunks_path())?;
        let adapter = OracleAdapter::new(oracle, self.settings.call_policy());
        let outcome = ExtractionPipeline::new(adapter).run(&chunks).await;

        save_json(&self.workspace.parsed_chunks_path(), &outcome.records)?;
        self.workspace.append_failures(&outcome.failures)?;
        log::info!(
            "Parsed chunks saved. Model used: {}",
            self.settings.model
        );
        Ok(outcome)
    }

    pub fn split_pdf<W: PdfWriter>(&self, writer: &W) -> AppResult<PartitionReport> {
        let records: Vec<ExtractedRecord> = load_json(&self.workspace.parsed_chunks_path())?;
        partition(&records, writer, &self.workspace.output_split_pdf_dir())
    }

    /// All stages with the default external tools.
    pub async fn run_all(&self) -> AppResult<RunReport> {
        let renderer = PdftoppmRenderer::new(&self.settings.pdftoppm_cmd, self.settings.dpi);
        self.convert_pdf_to_images(&renderer)?;

        let engine = TesseractEngine::new(&self.settings.tesseract_cmd);
        let pages = self.perform_ocr(&engine)?;

        let chunks = self.chunk_documents()?;

        let oracle = OllamaOracle::new(&self.settings.ollama_url, &self.settings.model);
        let outcome = self.parse_chunks(oracle).await?;

        let writer = LopdfWriter::open(&self.pdf_path)?;
        let split = self.split_pdf(&writer)?;

        let report = RunReport {
            source_pdf: self.pdf_path.display().to_string(),
            model: self.settings.model.clone(),
            finished_at: RunReport::stamp(),
            pages: pages.len(),
            chunks: chunks.len(),
            records: outcome.records.len(),
            failed_chunks: outcome.failures.iter().map(|f| f.chunk_id).collect(),
            files_written: split.written.len(),
            failed_writes: split.failures.iter().map(|(id, _)| *id).collect(),
        };
        save_json(&self.workspace.report_path(), &report)?;
        Ok(report)
    }
}

fn list_page_images(dir: &Path) -> AppResult<Vec<PageImage>> {
    let mut images: Vec<PageImage> = fs::read_dir(dir)?
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            page_number_from_image_name(&path).map(|page| PageImage { page, path })
        })
        .collect();
    images.sort_by_key(|image| image.page);
    Ok(images)
}
