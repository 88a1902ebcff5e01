// Catalog loading: the ordered list of extension ids to work through

use crate::error::{CoreError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Load extension ids from either a crawled sitemap (`*.json`, an array of
/// store URLs) or a plain newline-delimited id list.
pub fn load_catalog(path: &Path) -> Result<Vec<String>> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let ids = if is_json {
        load_sitemap(path)?
    } else {
        load_id_list(path)?
    };

    if ids.is_empty() {
        return Err(CoreError::Catalog(format!(
            "No extension ids found in {}",
            path.display()
        )));
    }
    Ok(ids)
}

/// Sitemap dump: a JSON array of extension URLs; the id is the last path
/// segment of each.
pub fn load_sitemap(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        CoreError::Catalog(format!("Failed to read sitemap {}: {}", path.display(), e))
    })?;
    let value: Value = serde_json::from_str(&content)?;
    let Value::Array(urls) = value else {
        return Err(CoreError::Catalog(format!(
            "Sitemap {} is not a JSON array",
            path.display()
        )));
    };

    Ok(urls
        .iter()
        .filter_map(Value::as_str)
        .filter_map(extension_id_from_url)
        .collect())
}

/// One id per line; blank lines and `#` comments are skipped.
pub fn load_id_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        CoreError::Catalog(format!("Failed to read id list {}: {}", path.display(), e))
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

pub fn extension_id_from_url(url: &str) -> Option<String> {
    let last = url.trim().rsplit('/').next()?;
    if last.is_empty() {
        None
    } else {
        Some(last.to_string())
    }
}
