//! JSON file helpers shared by the file-backed stores
//!
//! Directory layout under `storage.base_dir`:
//! ```text
//! profiles/<user_id>.json
//! cache/<user_id>.json
//! sessions/<user_id>.json
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Reject user ids that are unsafe as file names
pub(crate) fn validate_user_id(user_id: &str) -> Result<()> {
    let valid = !user_id.is_empty()
        && user_id.len() <= 64
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::Store(format!("invalid user id '{}'", user_id)))
    }
}

/// Path of a user's record inside `dir`
pub(crate) fn user_file(dir: &Path, user_id: &str) -> Result<PathBuf> {
    validate_user_id(user_id)?;
    Ok(dir.join(format!("{}.json", user_id)))
}

/// Read and parse a JSON file, `None` when it does not exist
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write JSON through a temp file and rename, so readers never see a
/// partially written record
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4()));
    tokio::fs::write(&tmp, json).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Remove a file, ignoring a missing one
pub(crate) async fn remove_file(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// User ids that have a `<id>.json` record in `dir`
pub(crate) async fn list_user_ids(dir: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if validate_user_id(stem).is_ok() {
            ids.push(stem.to_string());
        } else {
            tracing::warn!("Skipping unexpected file {}", path.display());
        }
    }

    ids.sort();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("123456789").is_ok());
        assert!(validate_user_id("user_1-a").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("../etc/passwd").is_err());
        assert!(validate_user_id("a:b").is_err());
        assert!(validate_user_id(&"9".repeat(65)).is_err());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = user_file(dir.path(), "42").unwrap();

        write_json(&path, &serde_json::json!({"a": 1})).await.unwrap();
        let value: serde_json::Value = read_json(&path).await.unwrap().unwrap();
        assert_eq!(value["a"], 1);
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");
        let value: Option<serde_json::Value> = read_json(&path).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_list_user_ids_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("7.json"), "{}").unwrap();
        std::fs::write(dir.path().join("3.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join("bad name.json"), "{}").unwrap();

        let ids = list_user_ids(dir.path()).await.unwrap();
        assert_eq!(ids, vec!["3".to_string(), "7".to_string()]);
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let ids = list_user_ids(&dir.path().join("nope")).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(remove_file(&dir.path().join("gone.json")).await.is_ok());
    }
}
