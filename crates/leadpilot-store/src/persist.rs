//! Durable JSON document IO.
//!
//! Writes go to a sibling temp file first and are renamed into place, so a
//! crash mid-write leaves the previous document intact and a concurrent
//! reader never sees a half-written file.

use leadpilot_core::error::{LeadPilotError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Atomically write a value as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| LeadPilotError::Storage(format!("serialize {}: {e}", path.display())))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a JSON document, returning the default when the file is missing
/// or unreadable as the expected shape.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    match std::fs::read_to_string(path) {
        Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {e}", path.display());
            T::default()
        }),
        Err(e) => {
            tracing::warn!("Failed to read {}: {e}", path.display());
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let dir = std::env::temp_dir().join("leadpilot-persist-test");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("doc.json");

        write_json(&path, &vec!["a".to_string(), "b".to_string()]).unwrap();
        let loaded: Vec<String> = read_json_or_default(&path);
        assert_eq!(loaded, vec!["a".to_string(), "b".to_string()]);

        // No stray temp file after a successful write.
        assert!(!dir.join("doc.json.tmp").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_yields_default() {
        let loaded: Vec<String> =
            read_json_or_default(Path::new("/nonexistent/leadpilot/doc.json"));
        assert!(loaded.is_empty());
    }
}
