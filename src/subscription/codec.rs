//! Turns a raw message body into the payload handed to a handler.
//!
//! Bodies are expected to be JSON. A body that does not parse is not an
//! error: it is logged once and passed through untouched as
//! [`Payload::Raw`], so a malformed message never stops a consumer.

use std::fmt;
use std::ops::{Deref, Index};

use serde_json::Value;
use tracing::warn;

/// A decoded JSON document.
///
/// Object members are looked up by plain string keys at every nesting level;
/// `doc["id"]`, `doc.get("id")` and `doc.get(String::from("id"))` are
/// equivalent. Missing keys index to `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document(Value);

impl Document {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn get(&self, key: impl AsRef<str>) -> Option<&Value> {
        self.0.get(key.as_ref())
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Deref for Document {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl Index<&str> for Document {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        &self.0[key]
    }
}

impl PartialEq<Value> for Document {
    fn eq(&self, other: &Value) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a handler receives for one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The body parsed as JSON.
    Structured(Document),
    /// The body as delivered, because it was not JSON.
    Raw(Vec<u8>),
}

impl Payload {
    pub fn is_structured(&self) -> bool {
        matches!(self, Payload::Structured(_))
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Payload::Structured(doc) => Some(doc),
            Payload::Raw(_) => None,
        }
    }

    /// The raw body as text, when it was not JSON and is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Raw(bytes) => std::str::from_utf8(bytes).ok(),
            Payload::Structured(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Raw(bytes) => Some(bytes),
            Payload::Structured(_) => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Structured(doc) => fmt::Display::fmt(doc, f),
            Payload::Raw(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

/// Decodes a message body.
///
/// Any well-formed JSON value, including arrays and scalars, becomes
/// [`Payload::Structured`]. Only a parse failure falls back to the raw body.
pub fn decode(body: &[u8]) -> Payload {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => Payload::Structured(Document(value)),
        Err(err) => {
            warn!(error = %err, "JSON data wasn't received, returning plain object");
            Payload::Raw(body.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;

    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn decode_counting_warnings(body: &[u8]) -> (Payload, usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(count.clone()));
        let payload = tracing::subscriber::with_default(subscriber, || decode(body));
        (payload, count.load(Ordering::SeqCst))
    }

    #[test]
    fn test_object_keys_are_looked_up_by_string() {
        let (payload, warnings) = decode_counting_warnings(br#"{"id":1,"state":"new"}"#);
        assert_eq!(warnings, 0);

        let doc = payload.as_document().expect("structured payload");
        assert_eq!(doc["id"], json!(1));
        assert_eq!(doc["state"], json!("new"));
        assert_eq!(doc.get("state"), Some(&json!("new")));
        assert_eq!(doc.get(String::from("id")), Some(&json!(1)));
        assert_eq!(doc["missing"], Value::Null);
    }

    #[test]
    fn test_nested_objects_keep_string_access() {
        let payload = decode(br#"{"order":{"lines":[{"sku":"A-1"}]}}"#);
        let doc = payload.as_document().unwrap();
        assert_eq!(doc["order"]["lines"][0]["sku"], json!("A-1"));
    }

    #[test]
    fn test_non_json_body_is_returned_unchanged_with_one_warning() {
        let (payload, warnings) = decode_counting_warnings(b"not json");
        assert_eq!(payload, Payload::Raw(b"not json".to_vec()));
        assert_eq!(payload.as_str(), Some("not json"));
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_top_level_scalars_and_arrays_are_structured() {
        assert_eq!(decode(b"42"), Payload::Structured(Document::new(json!(42))));
        assert!(decode(b"[1,2,3]").is_structured());
        assert!(decode(br#""quoted""#).is_structured());
    }

    #[test]
    fn test_truncated_and_binary_bodies_fall_back() {
        assert!(!decode(br#"{"id":"#).is_structured());
        assert!(!decode(b"").is_structured());

        let binary = [0xff, 0xfe, 0x00];
        let payload = decode(&binary);
        assert_eq!(payload.as_bytes(), Some(&binary[..]));
        assert_eq!(payload.as_str(), None);
    }
}
