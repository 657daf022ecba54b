//! Rule store on disk
//!
//! The store is the same JSON blob the extension keeps in synced storage:
//! `{ "rules": [...], "forceLoopEnabled": bool }`. A missing file is an
//! empty store. Records the CLI cannot edit (invalid, or a repeated id)
//! are carried through every command and written back unchanged.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use mr_core::{Rule, RuleRecords, RuleSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    pub rules: RuleSet,
    pub force_loop_enabled: bool,
    /// Records kept verbatim, see `validate`
    pub retained: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStore {
    #[serde(default)]
    rules: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    force_loop_enabled: Option<bool>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Record<'a> {
    Rule(&'a Rule),
    Raw(&'a serde_json::Value),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreOut<'a> {
    rules: Vec<Record<'a>>,
    force_loop_enabled: bool,
}

pub fn load_store(path: &Path) -> Result<Store, String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Store::default()),
        Err(e) => return Err(format!("Failed to read '{}': {}", path.display(), e)),
    };
    let raw: RawStore =
        serde_json::from_str(&text).map_err(|e| format!("Invalid store '{}': {}", path.display(), e))?;

    let records = RuleRecords::from_values(raw.rules.unwrap_or_default());
    if !records.retained.is_empty() {
        eprintln!(
            "Warning: keeping {} record(s) in '{}' that are not usable rules; run `validate` for details",
            records.retained.len(),
            path.display()
        );
    }
    Ok(Store {
        rules: records.rules,
        force_loop_enabled: raw.force_loop_enabled.unwrap_or(false),
        retained: records.retained,
    })
}

pub fn save_store(path: &Path, store: &Store) -> Result<(), String> {
    let out = StoreOut {
        rules: store
            .rules
            .iter()
            .map(Record::Rule)
            .chain(store.retained.iter().map(Record::Raw))
            .collect(),
        force_loop_enabled: store.force_loop_enabled,
    };
    let json = serde_json::to_string_pretty(&out).map_err(|e| format!("Failed to serialize store: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = load_store(&dir.path().join("rules.json")).expect("load");
        assert!(store.rules.is_empty());
        assert!(!store.force_loop_enabled);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rules.json");

        let mut store = Store::default();
        store.rules.upsert(Rule::new("1", "https://a.example/", "#title", "Hi"));
        store.force_loop_enabled = true;
        save_store(&path, &store).expect("save");

        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"forceLoopEnabled\": true"));
        assert!(text.contains("\"newContent\": \"Hi\""));
        assert_eq!(load_store(&path).expect("load"), store);
    }

    #[test]
    fn test_unusable_records_survive_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rules.json");
        fs::write(
            &path,
            r##"{"rules":[
                {"id":"1","url":"u","selector":"#a","newContent":"x"},
                {"id":"2","selector":"","newContent":"draft"},
                {"id":"1","url":"v","selector":"#b","newContent":"y"}
            ]}"##,
        )
        .expect("write");

        let store = load_store(&path).expect("load");
        assert_eq!(store.rules.len(), 1);
        assert_eq!(store.retained.len(), 2);
        save_store(&path, &store).expect("save");

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        let rules = value["rules"].as_array().expect("array");
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[1]["newContent"], "draft");
        assert_eq!(rules[2]["url"], "v");
    }

    #[test]
    fn test_invalid_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rules.json");
        fs::write(&path, "[1, 2").expect("write");
        let err = load_store(&path).unwrap_err();
        assert!(err.starts_with("Invalid store"));
    }
}
