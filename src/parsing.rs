//! Best-effort extraction of category proposals from model replies.
//!
//! Models are asked for JSON but often wrap it in prose or code fences. The
//! reply is cut from its first `{` to its last `}` and that span is decoded.
//! This is a bracket heuristic, not a tokenizer: a reply holding two separate
//! JSON objects, or prose containing a stray brace outside the object, yields
//! a span that does not decode and is reported as unparseable.

use crate::models::{AnalysisFailure, AnalysisResult, CategoryProposal};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct CategoryEnvelope {
    #[serde(default)]
    categories: Vec<CategoryProposal>,
}

/// Returns the span from the first `{` to the last `}` inclusive, if both
/// exist in that order.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Decodes the category list out of a free-text model reply.
///
/// Never fails: a reply without a decodable object becomes an
/// [`AnalysisFailure::ResponseUnparseable`] result. A decodable object without
/// a `categories` key is a successful, empty result.
pub fn parse_categories(raw: &str) -> AnalysisResult {
    let Some(fragment) = extract_json_object(raw) else {
        warn!(reply_len = raw.len(), "No JSON object found in model reply");
        return AnalysisResult::failed(AnalysisFailure::ResponseUnparseable);
    };

    match serde_json::from_str::<CategoryEnvelope>(fragment) {
        Ok(envelope) => {
            debug!(count = envelope.categories.len(), "Parsed categories from model reply");
            AnalysisResult::with_categories(envelope.categories)
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse model reply as JSON");
            AnalysisResult::failed(AnalysisFailure::ResponseUnparseable)
        }
    }
}
