//! Tesseract OCR over rendered page images.

use std::ffi::OsStr;
use std::path::Path;

use image::DynamicImage;

use crate::error::AppResult;
use crate::tools::{run_tool, scratch_dir};

pub trait OcrEngine {
    fn recognize(&self, image: &Path) -> AppResult<String>;
}

/// Scans come in lying on their side; this is a 270° counter-clockwise turn.
pub fn rotate_for_ocr(image: &DynamicImage) -> DynamicImage {
    image.rotate90()
}

pub struct TesseractEngine {
    pub program: String,
    pub language: String,
}

impl TesseractEngine {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            language: "eng".to_string(),
        }
    }

    /// Single uniform block of text, LSTM engine.
    fn args<'a>(&'a self, image: &'a Path) -> [&'a OsStr; 8] {
        [
            image.as_os_str(),
            OsStr::new("stdout"),
            OsStr::new("--psm"),
            OsStr::new("6"),
            OsStr::new("--oem"),
            OsStr::new("3"),
            OsStr::new("-l"),
            OsStr::new(&self.language),
        ]
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image_path: &Path) -> AppResult<String> {
        let parent = image_path.parent().unwrap_or_else(|| Path::new("."));
        let temp_dir = scratch_dir(parent, ".ocr")?;
        let rotated_path = temp_dir.path().join("rotated.png");

        let img = image::open(image_path)?;
        rotate_for_ocr(&img).save(&rotated_path)?;
        let stdout = run_tool(&self.program, self.args(&rotated_path))?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }
}
