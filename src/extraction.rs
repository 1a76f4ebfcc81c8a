//! Extraction schema, prompts, and output validation.
//!
//! The retrieval prompt, system role, and one-shot example live in
//! [`ExtractionSchema`] as plain data, so the pipeline can be retargeted to
//! a different record type without touching the orchestrator. The stock
//! schema reproduces the auditor-resignation extraction.

use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// One auditor-resignation event as emitted by the model.
///
/// Field names follow the JSON contract exactly; `SrNo.` (with the trailing
/// dot some models copy from the example) is accepted as an alias.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(rename = "SrNo", alias = "SrNo.")]
    pub sr_no: u32,
    #[serde(rename = "StockExchange")]
    pub stock_exchange: String,
    #[serde(rename = "DateOfResignation")]
    pub date_of_resignation: String,
    #[serde(rename = "CompanyTicker")]
    pub company_ticker: String,
    #[serde(rename = "CompanyName")]
    pub company_name: String,
    #[serde(rename = "ResigningAuditor")]
    pub resigning_auditor: String,
    #[serde(rename = "ReasonForResignation")]
    pub reason_for_resignation: String,
    #[serde(rename = "NewAuditorAppointmentDate")]
    pub new_auditor_appointment_date: String,
    #[serde(rename = "NewAuditorName")]
    pub new_auditor_name: String,
}

/// Prompts and example output defining what the pipeline extracts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionSchema {
    /// Embedded and used to query the vector index for relevant passages.
    pub retrieval_prompt: String,
    /// System role for the chat completion.
    pub system_prompt: String,
    /// Instruction prefix of the extraction prompt.
    pub instruction: String,
    /// One-shot example of the desired JSON shape.
    pub example_json: String,
}

impl ExtractionSchema {
    /// The stock auditor-resignation schema.
    pub fn auditor_resignations() -> Self {
        Self {
            retrieval_prompt: "Give me auditor resignation data. Data should include name of \
                stock exchange, company ticker, name of company, auditor resignation date, \
                resigning auditor name, reason for resignation, new auditor name, new auditor \
                appointment date."
                .to_string(),
            system_prompt: "You are stock market news data analyst.".to_string(),
            instruction: "Generate a json response containing information about resignation \
                details about auditor and new appointments from the stock market news data \
                below. Include all the properties as shown in the example and respond with \
                JSON only."
                .to_string(),
            example_json: r#"[{
  "SrNo": 1,
  "StockExchange": "HKEX",
  "DateOfResignation": "03-Dec-2021",
  "CompanyTicker": "8491 HK",
  "CompanyName": "Cool Link (Holdings)",
  "ResigningAuditor": "Grant Thornton HK Ltd",
  "ReasonForResignation": "Could not reach a consensus on the audit fee.",
  "NewAuditorAppointmentDate": "03-Dec-2021",
  "NewAuditorName": "UniTax Prism (HK) CPA Ltd"
}]"#
            .to_string(),
        }
    }

    /// Builds the user prompt for the chat completion from retrieved passages.
    pub fn extraction_prompt(&self, passages: &[String]) -> String {
        format!(
            "{instruction}\n\nStock market news data:\n{context}\n\nExample:\n{example}",
            instruction = self.instruction,
            context = passages.join("\n\n"),
            example = self.example_json,
        )
    }
}

/// Parses the model's raw output into records.
///
/// Accepts a JSON array or a single object, with or without a Markdown code
/// fence. Anything else fails with [`PipelineError::OutputValidation`].
pub fn parse_records(raw: &str) -> Result<Vec<ExtractedRecord>, PipelineError> {
    let body = strip_code_fence(raw.trim());
    let value: serde_json::Value = serde_json::from_str(body).map_err(|err| {
        PipelineError::OutputValidation(format!("model output is not valid JSON: {err}"))
    })?;

    let records = match value {
        serde_json::Value::Array(_) => serde_json::from_value::<Vec<ExtractedRecord>>(value),
        serde_json::Value::Object(_) => {
            serde_json::from_value::<ExtractedRecord>(value).map(|record| vec![record])
        }
        other => {
            return Err(PipelineError::OutputValidation(format!(
                "expected a JSON array of records, got {other}"
            )));
        }
    }
    .map_err(|err| {
        PipelineError::OutputValidation(format!("output does not match the record shape: {err}"))
    })?;

    Ok(records)
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}
