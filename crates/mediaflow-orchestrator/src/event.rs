//! Inbound event envelope: a notification record wrapping one storage-change record.
//!
//! ```json
//! {"Records":[{"EventSource":"aws:sns","Sns":{"Message":"{\"Records\":[{\"s3\":{...}}]}"}}]}
//! ```

use mediaflow_core::{HandleError, HandleResult};
use serde::Deserialize;

/// The object a run is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub bucket: String,
    /// URL-decoded object key
    pub key: String,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Records", default)]
    records: Vec<EnvelopeRecord>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeRecord {
    #[serde(rename = "EventSource", default)]
    event_source: Option<String>,
    #[serde(rename = "Sns")]
    sns: SnsPayload,
}

#[derive(Debug, Deserialize)]
struct SnsPayload {
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Deserialize)]
struct StorageMessage {
    #[serde(rename = "Records", default)]
    records: Vec<StorageRecord>,
}

#[derive(Debug, Deserialize)]
struct StorageRecord {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    key: String,
    #[serde(default)]
    size: Option<SizeField>,
}

/// Producers disagree on whether `size` is a number or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SizeField {
    Number(u64),
    Text(String),
}

impl SizeField {
    fn value(&self) -> HandleResult<u64> {
        match self {
            SizeField::Number(n) => Ok(*n),
            SizeField::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| HandleError::EventShape(format!("invalid object size: {}", s))),
        }
    }
}

fn exactly_one<T>(mut records: Vec<T>, level: &str) -> HandleResult<T> {
    if records.len() != 1 {
        return Err(HandleError::EventShape(format!(
            "expected exactly one {} record, got {}",
            level,
            records.len()
        )));
    }
    records
        .pop()
        .ok_or_else(|| HandleError::EventShape(format!("missing {} record", level)))
}

/// Parse the envelope into the single object it describes.
pub fn parse_event(json: &str) -> HandleResult<StorageEvent> {
    let envelope: Envelope = serde_json::from_str(json)
        .map_err(|e| HandleError::EventShape(format!("malformed envelope: {}", e)))?;
    let record = exactly_one(envelope.records, "notification")?;

    if let Some(source) = &record.event_source {
        tracing::debug!(event_source = %source, "Parsing notification record");
    }

    let message: StorageMessage = serde_json::from_str(&record.sns.message)
        .map_err(|e| HandleError::EventShape(format!("malformed storage message: {}", e)))?;
    let record = exactly_one(message.records, "storage")?;

    let size = record.s3.object.size.as_ref().map(SizeField::value).transpose()?;

    Ok(StorageEvent {
        bucket: record.s3.bucket.name,
        key: decode_key(&record.s3.object.key)?,
        size,
    })
}

/// Storage event keys are form-encoded: `+` is a space, `%XX` an escaped byte.
pub fn decode_key(raw: &str) -> HandleResult<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|key| key.into_owned())
        .map_err(|e| HandleError::EventShape(format!("undecodable object key {}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(inner: serde_json::Value) -> String {
        json!({
            "Records": [{
                "EventSource": "aws:sns",
                "Sns": { "Message": inner.to_string() }
            }]
        })
        .to_string()
    }

    fn s3_record(key: &str, size: serde_json::Value) -> serde_json::Value {
        json!({
            "s3": {
                "bucket": { "name": "uploads" },
                "object": { "key": key, "size": size }
            }
        })
    }

    #[test]
    fn test_parse_single_record() {
        let event = parse_event(&envelope(json!({
            "Records": [s3_record("photos/My+Photo%281%29.JPG", json!(1024))]
        })))
        .unwrap();

        assert_eq!(event.bucket, "uploads");
        assert_eq!(event.key, "photos/My Photo(1).JPG");
        assert_eq!(event.size, Some(1024));
    }

    #[test]
    fn test_size_as_string() {
        let event = parse_event(&envelope(json!({
            "Records": [s3_record("a.png", json!("2048"))]
        })))
        .unwrap();
        assert_eq!(event.size, Some(2048));

        let err = parse_event(&envelope(json!({
            "Records": [s3_record("a.png", json!("big"))]
        })))
        .unwrap_err();
        assert!(matches!(err, HandleError::EventShape(_)));
    }

    #[test]
    fn test_missing_size() {
        let event = parse_event(&envelope(json!({
            "Records": [{ "s3": { "bucket": { "name": "b" }, "object": { "key": "a.png" } } }]
        })))
        .unwrap();
        assert_eq!(event.size, None);
    }

    #[test]
    fn test_record_counts() {
        let none = parse_event(&envelope(json!({ "Records": [] }))).unwrap_err();
        assert!(matches!(none, HandleError::EventShape(_)));

        let two = parse_event(&envelope(json!({
            "Records": [s3_record("a.png", json!(1)), s3_record("b.png", json!(1))]
        })))
        .unwrap_err();
        assert!(two.to_string().contains("got 2"));

        let outer = parse_event(r#"{"Records": []}"#).unwrap_err();
        assert!(matches!(outer, HandleError::EventShape(_)));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            parse_event("not json"),
            Err(HandleError::EventShape(_))
        ));
        assert!(matches!(
            parse_event(&json!({"Records": [{"Sns": {"Message": "nope"}}]}).to_string()),
            Err(HandleError::EventShape(_))
        ));
    }

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key("a+b%2Bc.jpg").unwrap(), "a b+c.jpg");
        assert_eq!(decode_key("%E2%9C%93.png").unwrap(), "\u{2713}.png");
        assert!(decode_key("%FF.png").is_err());
    }
}
