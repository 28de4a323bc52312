//! Layout of a working directory and the artifacts each stage leaves in it.
//!
//! Every stage reads the previous stage's output from here, so any single
//! stage can be re-run without repeating the slow ones before it.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::pages::PageRecord;
use crate::pipeline::FailureEntry;

#[derive(Debug, Clone)]
pub struct Workspace {
    pub base_dir: PathBuf,
}

/// Summary written at the end of `run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub source_pdf: String,
    pub model: String,
    pub finished_at: String,
    pub pages: usize,
    pub chunks: usize,
    pub records: usize,
    pub failed_chunks: Vec<u32>,
    pub files_written: usize,
    pub failed_writes: Vec<u32>,
}

impl RunReport {
    pub fn stamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

impl Workspace {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn image_dir(&self) -> PathBuf {
        self.base_dir.join("pages")
    }

    pub fn ocr_text_dir(&self) -> PathBuf {
        self.base_dir.join("ocr_text")
    }

    pub fn ocr_json_path(&self) -> PathBuf {
        self.base_dir.join("ocr_pages.json")
    }

    pub fn chunks_path(&self) -> PathBuf {
        self.base_dir.join("chunks.json")
    }

    pub fn parsed_chunks_path(&self) -> PathBuf {
        self.base_dir.join("parsed_chunks.json")
    }

    pub fn failed_log_path(&self) -> PathBuf {
        self.base_dir.join("failed_chunks_log.txt")
    }

    pub fn report_path(&self) -> PathBuf {
        self.base_dir.join("run_report.json")
    }

    pub fn output_split_pdf_dir(&self) -> PathBuf {
        self.base_dir.join("split_pdfs")
    }

    pub fn ensure_dirs(&self) -> AppResult<()> {
        fs::create_dir_all(self.image_dir())?;
        fs::create_dir_all(self.ocr_text_dir())?;
        fs::create_dir_all(self.output_split_pdf_dir())?;
        Ok(())
    }

    pub fn write_page_text(&self, page: &PageRecord) -> AppResult<PathBuf> {
        let path = self.ocr_text_dir().join(format!("page_{:03}.txt", page.page));
        fs::write(&path, &page.text)?;
        Ok(path)
    }

    /// Append failures to the log; earlier runs' entries are kept.
    pub fn append_failures(&self, failures: &[FailureEntry]) -> AppResult<()> {
        if failures.is_empty() {
            return Ok(());
        }
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.failed_log_path())?;
        for failure in failures {
            write!(log, "{}\n\n", failure.log_line())?;
        }
        Ok(())
    }
}

pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
