use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One content record of a given content type. Fields beyond `uid` and
/// `title` are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub uid: String,
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entry {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// `{ "entries": [...] }`
#[derive(Debug, Deserialize)]
pub(crate) struct EntriesEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub entries: Vec<T>,
}

/// `{ "entry": {...} }`
#[derive(Debug, Deserialize)]
pub(crate) struct EntryEnvelope<T> {
    pub entry: T,
}
