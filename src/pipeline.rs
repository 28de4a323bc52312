//! Runs every chunk through the oracle and the response parser.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::oracle::{ExtractionOracle, OracleAdapter};
use crate::parser::{parse_fields, ExtractedFields};
use crate::segmenter::Chunk;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub chunk_id: u32,
    pub pages: Vec<u32>,
    #[serde(flatten)]
    pub fields: ExtractedFields,
}

/// A chunk that produced no record, with enough context to retry it by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub chunk_id: u32,
    pub pages: Vec<u32>,
    pub message: String,
}

impl FailureEntry {
    pub fn log_line(&self) -> String {
        format!(
            "Chunk {} (pages {:?}) failed: {}",
            self.chunk_id, self.pages, self.message
        )
    }
}

#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub records: Vec<ExtractedRecord>,
    pub failures: Vec<FailureEntry>,
    pub skipped: Vec<u32>,
}

pub struct ExtractionPipeline<O> {
    adapter: OracleAdapter<O>,
}

impl<O: ExtractionOracle> ExtractionPipeline<O> {
    pub fn new(adapter: OracleAdapter<O>) -> Self {
        Self { adapter }
    }

    /// Process chunks in order. A failing chunk is recorded and never retried.
    pub async fn run(&self, chunks: &[Chunk]) -> ExtractionOutcome {
        let mut outcome = ExtractionOutcome::default();

        for chunk in chunks {
            match self.extract(chunk).await {
                Ok(Some(fields)) => {
                    log::info!("Parsed chunk {}", chunk.chunk_id);
                    outcome.records.push(ExtractedRecord {
                        chunk_id: chunk.chunk_id,
                        pages: chunk.pages.clone(),
                        fields,
                    });
                }
                Ok(None) => {
                    log::debug!("Skipped chunk {}: too little text", chunk.chunk_id);
                    outcome.skipped.push(chunk.chunk_id);
                }
                Err(e) => {
                    let entry = FailureEntry {
                        chunk_id: chunk.chunk_id,
                        pages: chunk.pages.clone(),
                        message: e.to_string(),
                    };
                    log::error!("{}", entry.log_line());
                    outcome.failures.push(entry);
                }
            }
        }

        log::info!(
            "Extraction finished: {} parsed, {} failed, {} skipped",
            outcome.records.len(),
            outcome.failures.len(),
            outcome.skipped.len()
        );
        outcome
    }

    async fn extract(&self, chunk: &Chunk) -> Result<Option<ExtractedFields>, AppError> {
        let Some(response) = self.adapter.call(&chunk.text).await? else {
            return Ok(None);
        };
        parse_fields(&response)
            .inspect_err(|e| log::warn!("JSON parse error for chunk {}: {}", chunk.chunk_id, e))
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::oracle::testing::{no_delay, ScriptedOracle};
    use crate::segmenter::TypeHint;

    fn chunk(chunk_id: u32, pages: Vec<u32>, text: &str) -> Chunk {
        Chunk {
            chunk_id,
            type_hint: TypeHint::Invoice,
            pages,
            text: text.to_string(),
        }
    }

    fn long_text(tag: &str) -> String {
        format!("{} {}", tag, "BILL OF LADING shipped on board MT AURORA ".repeat(2))
    }

    fn pipeline(answers: Vec<Result<String, AppError>>) -> ExtractionPipeline<ScriptedOracle> {
        ExtractionPipeline::new(OracleAdapter::new(ScriptedOracle::new(answers), no_delay()))
    }

    #[tokio::test]
    async fn record_inherits_chunk_id_and_pages() {
        let p = pipeline(vec![Ok(
            r#"Sure! {"document_type": "Bill of Lading", "vessel_name": "MT Aurora"}"#.into(),
        )]);
        let outcome = p.run(&[chunk(3, vec![9, 10, 11], &long_text("a"))]).await;
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.chunk_id, 3);
        assert_eq!(record.pages, vec![9, 10, 11]);
        assert_eq!(record.fields.vessel_name, "MT Aurora");
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn short_chunk_yields_neither_record_nor_failure() {
        let p = pipeline(vec![]);
        let outcome = p.run(&[chunk(1, vec![1], "0123456789")]).await;
        assert!(outcome.records.is_empty());
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.skipped, vec![1]);
    }

    #[tokio::test]
    async fn failures_are_logged_and_run_continues() {
        let p = pipeline(vec![
            Err(AppError::OracleCall("connection reset".into())),
            Ok("I am unable to help with that.".into()),
            Ok(r#"{"document_type": "Certificate"}"#.into()),
        ]);
        let chunks = vec![
            chunk(1, vec![1, 2, 3], &long_text("one")),
            chunk(2, vec![5, 6, 7], &long_text("two")),
            chunk(3, vec![39], &long_text("three")),
        ];
        let outcome = p.run(&chunks).await;

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].chunk_id, 3);

        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[0].chunk_id, 1);
        assert!(outcome.failures[0].message.contains("connection reset"));
        assert_eq!(outcome.failures[1].chunk_id, 2);
        assert_eq!(outcome.failures[1].pages, vec![5, 6, 7]);
        assert!(outcome.failures[1].message.contains("Extraction parse error"));
    }

    #[tokio::test]
    async fn empty_object_reply_is_a_failure() {
        let p = pipeline(vec![Ok("{}".into())]);
        let outcome = p.run(&[chunk(1, vec![1, 2, 3], &long_text("invoice"))]).await;
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].message.contains("empty object"));
    }

    #[tokio::test]
    async fn unknown_keys_survive_into_the_record() {
        let p = pipeline(vec![Ok(
            r#"{"document_type": "Invoice", "currency": "USD"}"#.into(),
        )]);
        let outcome = p.run(&[chunk(2, vec![5, 6, 7], &long_text("b"))]).await;
        let value = serde_json::to_value(&outcome.records[0]).unwrap();
        assert_eq!(value["currency"], "USD");
        assert_eq!(value["chunk_id"], 2);
    }

    #[test]
    fn record_serializes_flat() {
        let record = ExtractedRecord {
            chunk_id: 4,
            pages: vec![25],
            fields: ExtractedFields {
                document_type: "Bill of Lading".into(),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["chunk_id"], 4);
        assert_eq!(value["document_type"], "Bill of Lading");
        assert_eq!(value["suggested_filename"], "");
    }

    #[test]
    fn failure_line_names_chunk_and_pages() {
        let entry = FailureEntry {
            chunk_id: 7,
            pages: vec![29],
            message: "Oracle call failed: timeout".into(),
        };
        assert_eq!(
            entry.log_line(),
            "Chunk 7 (pages [29]) failed: Oracle call failed: timeout"
        );
    }
}
