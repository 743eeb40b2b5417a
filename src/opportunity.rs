use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A corpus record: the opaque payload shown to callers plus the
/// precomputed embedding used for ranking, if the record carried a usable one.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub payload: Value,
    pub embedding: Option<Vec<f32>>,
}

impl Item {
    pub fn new(payload: Value, embedding: Option<Vec<f32>>) -> Self {
        Self { payload, embedding }
    }

    /// Display label used in diagnostics.
    pub fn label(&self) -> &str {
        self.payload
            .get("activity_name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }
}

/// Lenient typed view of an opportunity record.
///
/// Every field is optional; fields with an unexpected shape are treated as
/// missing instead of failing the whole record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(default, deserialize_with = "lenient")]
    pub activity_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub activity_description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<Location>,
    #[serde(default, deserialize_with = "lenient")]
    pub age_range: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cost: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub schedule: Option<Schedule>,
    #[serde(default, deserialize_with = "lenient")]
    pub tags: Option<Tags>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, deserialize_with = "lenient")]
    pub days: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub times: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tags {
    #[serde(default, deserialize_with = "lenient")]
    pub categories: Option<Vec<String>>,
}

impl Opportunity {
    /// Typed view over a record payload. Non-object payloads yield an empty view.
    pub fn from_payload(payload: &Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
