// Flat, fixed-schema view of one extension's report

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Name used for extensions the service has no report for.
pub const NO_DATA_NAME: &str = "No data available.";

/// Every field a record carries, in serialization order.
pub const RECORD_FIELDS: [&str; 23] = [
    "extension_id",
    "name",
    "short_description",
    "version",
    "last_updated",
    "total_risk",
    "csp_risk",
    "permissions_risk",
    "webstore_risk",
    "offered_by",
    "rating",
    "rating_users",
    "users",
    "size",
    "type",
    "permission_warnings",
    "email",
    "address",
    "privacy_policy",
    "URLs",
    "dangerous_fns",
    "entrypoints",
    "manifest",
];

/// Column order of the CSV dumps. Kept stable across runs so batches can be
/// concatenated.
pub const CSV_COLUMNS: [&str; 20] = [
    "extension_id",
    "name",
    "short_description",
    "version",
    "last_updated",
    "total_risk",
    "offered_by",
    "rating",
    "rating_users",
    "users",
    "size",
    "type",
    "permission_warnings",
    "email",
    "address",
    "privacy_policy",
    "entrypoints",
    "csp_risk",
    "permissions_risk",
    "webstore_risk",
];

/// `None` is the unknown marker: the source document did not carry the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub extension_id: String,
    pub name: Option<String>,
    pub short_description: Option<String>,
    pub version: Option<String>,
    pub last_updated: Option<String>,
    pub total_risk: Option<Number>,
    pub csp_risk: Option<Number>,
    pub permissions_risk: Option<Number>,
    pub webstore_risk: Option<Number>,
    pub offered_by: Option<String>,
    pub rating: Option<f64>,
    pub rating_users: Option<u64>,
    pub users: Option<u64>,
    pub size: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub permission_warnings: Option<Vec<String>>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub privacy_policy: Option<String>,
    #[serde(rename = "URLs")]
    pub urls: Option<Vec<Value>>,
    pub dangerous_fns: Option<Vec<String>>,
    pub entrypoints: Option<Vec<Value>>,
    pub manifest: Option<Value>,
}

impl NormalizedRecord {
    /// A record with nothing but the identifier.
    pub fn unknown(extension_id: &str) -> Self {
        Self {
            extension_id: extension_id.to_string(),
            name: None,
            short_description: None,
            version: None,
            last_updated: None,
            total_risk: None,
            csp_risk: None,
            permissions_risk: None,
            webstore_risk: None,
            offered_by: None,
            rating: None,
            rating_users: None,
            users: None,
            size: None,
            kind: None,
            permission_warnings: None,
            email: None,
            address: None,
            privacy_policy: None,
            urls: None,
            dangerous_fns: None,
            entrypoints: None,
            manifest: None,
        }
    }

    pub fn no_data(extension_id: &str) -> Self {
        Self {
            name: Some(NO_DATA_NAME.to_string()),
            ..Self::unknown(extension_id)
        }
    }

    pub fn has_data(&self) -> bool {
        self.name.as_deref() != Some(NO_DATA_NAME)
    }

    /// Cells in `CSV_COLUMNS` order. Unknown fields are empty cells; lists
    /// and documents are written as compact JSON.
    pub fn csv_row(&self) -> Vec<String> {
        vec![
            self.extension_id.clone(),
            text(&self.name),
            text(&self.short_description),
            text(&self.version),
            text(&self.last_updated),
            display(&self.total_risk),
            text(&self.offered_by),
            display(&self.rating),
            display(&self.rating_users),
            display(&self.users),
            text(&self.size),
            text(&self.kind),
            json(&self.permission_warnings),
            text(&self.email),
            text(&self.address),
            text(&self.privacy_policy),
            json(&self.entrypoints),
            display(&self.csp_risk),
            display(&self.permissions_risk),
            display(&self.webstore_risk),
        ]
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn display<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn json<T: Serialize>(value: &Option<T>) -> String {
    value
        .as_ref()
        .and_then(|v| serde_json::to_string(v).ok())
        .unwrap_or_default()
}
