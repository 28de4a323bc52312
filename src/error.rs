use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Page numbering is broken; aborts ingestion.
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    /// The oracle answered but no JSON object could be recovered.
    #[error("Extraction parse error: {0}")]
    ExtractionParse(String),
    #[error("Oracle call failed: {0}")]
    OracleCall(String),
    #[error("Output write failed: {0}")]
    OutputWrite(String),
    #[error("External tool failed: {0}")]
    Tool(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl AppError {
    /// Errors the pipeline records and moves past instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::ExtractionParse(_) | AppError::OracleCall(_) | AppError::OutputWrite(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
