//! The text-generation oracle and the adapter that paces calls to it.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::pages::is_short_text;

/// Anything that turns a prompt into a raw text answer.
pub trait ExtractionOracle {
    fn generate(&self, prompt: &str) -> impl Future<Output = AppResult<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Sleep after every successful call so the local model can keep up.
    pub pacing_delay: Duration,
    pub timeout: Option<Duration>,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            pacing_delay: Duration::from_secs(1),
            timeout: None,
        }
    }
}

pub fn build_prompt(text: &str) -> String {
    format!(
        r#"
You are an intelligent document parser for oil trading documents.

Analyze the following document text and extract the following fields. Respond ONLY with a valid JSON object, no explanations.

Document text:
"""{}"""

JSON format:
{{
  "document_type": "Invoice | Bill of Lading | Certificate",
  "invoice_number": "",
  "issue_date": "",
  "due_date": "",
  "buyer": "",
  "seller": "",
  "total_amount_usd": "",
  "vessel_name": "",
  "bbl_quantity": "",
  "bl_date": "",
  "port_of_loading": "",
  "port_of_discharge": "",
  "suggested_filename": ""
}}
"#,
        text
    )
}

pub struct OracleAdapter<O> {
    oracle: O,
    policy: CallPolicy,
}

impl<O: ExtractionOracle> OracleAdapter<O> {
    pub fn new(oracle: O, policy: CallPolicy) -> Self {
        Self { oracle, policy }
    }

    pub fn policy(&self) -> CallPolicy {
        self.policy
    }

    /// Ask the oracle about one chunk's text.
    ///
    /// Returns `Ok(None)` without calling anything when the trimmed text is too
    /// short to be a real document.
    pub async fn call(&self, text: &str) -> AppResult<Option<String>> {
        let text = text.trim();
        if is_short_text(text) {
            return Ok(None);
        }

        let prompt = build_prompt(text);
        let response = match self.policy.timeout {
            Some(limit) => tokio::time::timeout(limit, self.oracle.generate(&prompt))
                .await
                .map_err(|_| {
                    AppError::OracleCall(format!("no response within {}s", limit.as_secs_f32()))
                })?,
            None => self.oracle.generate(&prompt).await,
        };
        let response = response.map_err(|e| match e {
            AppError::OracleCall(_) => e,
            other => AppError::OracleCall(other.to_string()),
        })?;

        if !self.policy.pacing_delay.is_zero() {
            tokio::time::sleep(self.policy.pacing_delay).await;
        }
        Ok(Some(response))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    /// Replays canned answers and records every prompt it was given.
    #[derive(Default)]
    pub struct ScriptedOracle {
        pub answers: RefCell<VecDeque<AppResult<String>>>,
        pub prompts: RefCell<Vec<String>>,
    }

    impl ScriptedOracle {
        pub fn new(answers: Vec<AppResult<String>>) -> Self {
            Self {
                answers: RefCell::new(answers.into()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl ExtractionOracle for ScriptedOracle {
        async fn generate(&self, prompt: &str) -> AppResult<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.answers
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::OracleCall("script exhausted".into())))
        }
    }

    pub fn no_delay() -> CallPolicy {
        CallPolicy {
            pacing_delay: Duration::ZERO,
            timeout: None,
        }
    }
}
