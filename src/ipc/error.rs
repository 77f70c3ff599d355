use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

/// Success carrying non-fatal advisory messages for the user. An empty list
/// is omitted from the envelope.
pub fn ok_with_advisories(
    id: &str,
    mut result: serde_json::Value,
    advisories: Vec<String>,
) -> serde_json::Value {
    if !advisories.is_empty() {
        result["advisories"] = json!(advisories);
    }
    ok(id, result)
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}
