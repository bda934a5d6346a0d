//! Mapping of HTTP failures onto [`InventoryError`]
//!
//! Error bodies look like
//! `{"error": {"code", "message", "innerError" | "details": [...]}}`; the
//! nested part is flattened into the `inner` text so it reaches the report.

use licsync_core::InventoryError;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(rename = "innerError", default)]
    inner_error: Option<Value>,
    #[serde(default)]
    details: Vec<ErrorBody>,
}

impl ErrorBody {
    fn inner(&self) -> Option<String> {
        let from_inner = match &self.inner_error {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Object(map)) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| Some(Value::Object(map.clone()).to_string())),
            _ => None,
        };
        if from_inner.is_some() {
            return from_inner;
        }

        let details: Vec<String> = self
            .details
            .iter()
            .map(|d| match (d.code.is_empty(), d.message.is_empty()) {
                (false, false) => format!("{}: {}", d.code, d.message),
                (true, _) => d.message.clone(),
                (false, true) => d.code.clone(),
            })
            .filter(|s| !s.is_empty())
            .collect();
        (!details.is_empty()).then(|| details.join("; "))
    }
}

/// 404 codes that mean the target itself is absent. Any other 404 code (for
/// example `SubscriptionNotFound`) says nothing about the target.
const ABSENT_CODES: [&str; 2] = ["ResourceNotFound", "ResourceGroupNotFound"];

fn is_absent(parsed: Option<&ErrorBody>) -> bool {
    parsed.map_or(true, |e| {
        e.code.is_empty() || ABSENT_CODES.iter().any(|c| c.eq_ignore_ascii_case(&e.code))
    })
}

/// Translate a non-success response
pub(crate) fn map_status(status: u16, body: &str, target: &str) -> InventoryError {
    let parsed = serde_json::from_str::<Envelope>(body).ok().map(|e| e.error);
    let message = parsed
        .as_ref()
        .map(|e| e.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status} for {target}")
            } else {
                trimmed.to_string()
            }
        });

    match status {
        404 if is_absent(parsed.as_ref()) => InventoryError::NotFound(target.to_string()),
        401 => InventoryError::Unauthorized(message),
        403 => InventoryError::Forbidden(message),
        429 => InventoryError::Throttled(message),
        500..=599 => InventoryError::Transient(message),
        _ => InventoryError::Api {
            status,
            code: parsed
                .as_ref()
                .map(|e| e.code.clone())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            inner: parsed.as_ref().and_then(ErrorBody::inner),
            message,
        },
    }
}
