//! Run notifications
//!
//! Success: `{"statusCode":200,"data":[<variant>...],"type":"MEDIA_HANDLE"}`
//! Failure: `{"statusCode":500,"data":"<error message>","type":"MEDIA_HANDLE"}`
//!
//! Caller fields are merged over these and win on conflict.

use mediaflow_core::VariantResult;
use serde_json::{json, Map, Value};

pub const NOTIFICATION_TYPE: &str = "MEDIA_HANDLE";

pub fn success(results: &[VariantResult], extra: Option<Map<String, Value>>) -> Value {
    build(200, json!(results), extra)
}

pub fn failure(message: &str, extra: Option<Map<String, Value>>) -> Value {
    build(500, Value::String(message.to_string()), extra)
}

fn build(status_code: u16, data: Value, extra: Option<Map<String, Value>>) -> Value {
    let mut fields = Map::new();
    fields.insert("statusCode".to_string(), json!(status_code));
    fields.insert("data".to_string(), data);
    fields.insert("type".to_string(), json!(NOTIFICATION_TYPE));

    if let Some(extra) = extra {
        fields.extend(extra);
    }
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaflow_core::Dimension;

    #[test]
    fn test_success_payload() {
        let results = vec![VariantResult::image(
            "k-100_100.webp".to_string(),
            "webp".to_string(),
            12,
            Dimension::new(100, 100),
        )];
        let n = success(&results, None);

        assert_eq!(n["statusCode"], 200);
        assert_eq!(n["type"], "MEDIA_HANDLE");
        assert_eq!(n["data"][0]["type"], "image");
        assert_eq!(n["data"][0]["isOriginal"], false);
    }

    #[test]
    fn test_failure_payload_with_caller_fields() {
        let mut extra = Map::new();
        extra.insert("type".to_string(), json!("CUSTOM"));
        extra.insert("requestId".to_string(), json!("r-1"));

        let n = failure("File not supported: no handler", Some(extra));
        assert_eq!(n["statusCode"], 500);
        assert_eq!(n["data"], "File not supported: no handler");
        assert_eq!(n["type"], "CUSTOM");
        assert_eq!(n["requestId"], "r-1");
    }
}
