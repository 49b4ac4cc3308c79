use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::{
    extraction::ExtractionResult,
    listing::{ListingRecord, SENTINEL},
    mission::Blueprint,
};

use super::CompletionModel;

const SYSTEM_PROMPT: &str = "You are a precise data extraction engine. You read the text of a web page and return every listing on it as structured JSON. You never invent data.";

#[derive(Deserialize)]
struct ModelResponse {
    items: Vec<Map<String, Value>>,
}

pub fn build_prompt(blueprint: &Blueprint, page_text: &str) -> String {
    format!(
        r#"Extract every listing item from the page text below.

Fields to extract for each item: {fields}

Rules:
- Extract ALL items present on the page. Do not stop early and do not cap the number of items.
- Links in the text appear as `<text> (Link: <url>)`. When a field asks for a link or URL, use the url inside the parentheses.
- If a field cannot be found for an item, use the value "{sentinel}".
- Respond with a single JSON object with exactly one key "items" whose value is an array of flat objects mapping each field name to a string value.

Page text:
{page_text}"#,
        fields = blueprint.as_prompt_list(),
        sentinel = SENTINEL,
        page_text = page_text,
    )
}

fn strip_code_fence(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.strip_prefix("```") {
        Some(rest) => rest
            .trim_start_matches("json")
            .trim_end()
            .trim_end_matches("```")
            .trim(),
        None => raw,
    }
}

fn cell(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => SENTINEL.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Parses a model answer of the shape `{"items": [{..}, ..]}`.
pub fn parse_items(raw: &str) -> ExtractionResult {
    let response: ModelResponse = match serde_json::from_str(strip_code_fence(raw)) {
        Ok(response) => response,
        Err(e) => return ExtractionResult::failure(format!("Malformed model response: {}", e)),
    };

    if response.items.is_empty() {
        return ExtractionResult::failure("Model response contained no items");
    }

    let records = response
        .items
        .into_iter()
        .map(|item| {
            let mut record = ListingRecord::new();
            for (key, value) in item {
                record.insert(&key, cell(value));
            }
            record
        })
        .collect();

    ExtractionResult::Success(records)
}

/// Any failure (missing key, API error, bad JSON) comes back as
/// `ExtractionResult::Failure`; nothing is retried here.
pub async fn extract_with_model<M: CompletionModel + ?Sized>(
    model: &M,
    blueprint: &Blueprint,
    page_text: &str,
) -> ExtractionResult {
    let prompt = build_prompt(blueprint, page_text);

    match model.complete_json(SYSTEM_PROMPT, &prompt).await {
        Ok(raw) => parse_items(&raw),
        Err(e) => {
            log::error!("Model extraction failed: {:?}", e);
            ExtractionResult::failure(e)
        }
    }
}
