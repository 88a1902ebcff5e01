use crate::error::{ClientError, Result};
use reqwest::header::HeaderValue;
use std::fmt;
use std::fs;
use std::path::Path;

pub const API_KEY_HEADER: &str = "API-Key";

/// Static API credential, read once and shared by every request.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(ClientError::Credential("API key is empty".to_string()));
        }
        Ok(Self(key))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ClientError::Credential(format!("Failed to read API key {}: {}", path.display(), e))
        })?;
        Self::new(contents)
    }

    pub(crate) fn header_value(&self) -> Result<HeaderValue> {
        let mut value = HeaderValue::from_str(&self.0)
            .map_err(|e| ClientError::Credential(format!("API key is not a valid header: {}", e)))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
