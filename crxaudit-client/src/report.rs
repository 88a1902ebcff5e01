use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// A report as the service hands it back for one extension.
///
/// `NotScanned` covers every "nothing here yet" payload the service produces
/// (`null`, `[]`, `{}`), so callers never inspect an empty document.
#[derive(Debug, Clone, PartialEq)]
pub enum RawReport {
    NotScanned,
    Scanned(Box<ReportDocument>),
}

impl RawReport {
    pub fn is_scanned(&self) -> bool {
        matches!(self, RawReport::Scanned(_))
    }

    pub fn document(&self) -> Option<&ReportDocument> {
        match self {
            RawReport::Scanned(doc) => Some(doc),
            RawReport::NotScanned => None,
        }
    }

    /// Build a report from a single JSON document.
    pub fn from_json(value: Value) -> serde_json::Result<Self> {
        if is_empty_payload(&value) {
            return Ok(RawReport::NotScanned);
        }
        let doc: ReportDocument = serde_json::from_value(value)?;
        Ok(RawReport::Scanned(Box::new(doc)))
    }

    /// Pick the most recent report out of a `/report/{id}` response body.
    /// Reports are listed oldest first.
    pub fn latest_from_response(value: Value) -> serde_json::Result<Self> {
        if is_empty_payload(&value) {
            return Ok(RawReport::NotScanned);
        }
        let mut reports: Vec<Value> = serde_json::from_value(value)?;
        match reports.pop() {
            Some(latest) => Self::from_json(latest),
            None => Ok(RawReport::NotScanned),
        }
    }
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    #[serde(default, deserialize_with = "lenient_text")]
    pub extension_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub data: ReportData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    #[serde(default, deserialize_with = "lenient")]
    pub risk: Option<Risk>,
    /// Outbound URLs the extension calls.
    #[serde(default, deserialize_with = "lenient")]
    pub extcalls: Option<Vec<Value>>,
    /// Flagged function name -> call sites.
    #[serde(default, deserialize_with = "lenient")]
    pub dangerousfunctions: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient")]
    pub entrypoints: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient")]
    pub manifest: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub webstore: Option<WebstoreListing>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    #[serde(default, deserialize_with = "lenient")]
    pub total: Option<Number>,
    #[serde(default, deserialize_with = "lenient")]
    pub csp: Option<SubScore>,
    #[serde(default, deserialize_with = "lenient")]
    pub permissions: Option<SubScore>,
    #[serde(default, deserialize_with = "lenient")]
    pub webstore: Option<SubScore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    #[serde(default, deserialize_with = "lenient")]
    pub total: Option<Number>,
}

/// Chrome Web Store listing. The service returns it whole or not at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebstoreListing {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub short_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub last_updated: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub offered_by: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub rating_users: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub users: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub permission_warnings: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub privacy_policy: Option<String>,
}

/// Wrong-typed leaves read as absent instead of failing the whole document.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => Ok(serde_json::from_value(value).ok()),
    }
}

/// Text leaves; numbers and booleans keep their JSON spelling.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    })
}

fn lenient_section<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}
