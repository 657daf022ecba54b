//! Rule file export, import and inspection.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use mr_core::rule::Rule;
use mr_rulefile::{
    check_file_name, decrypt, export_file_name, export_rules, import_rules, merge_import, select_for_export,
    PASSPHRASE,
};

use crate::store_file::{load_store, save_store};

/// Write the store's rules (or the `ids` subset) to an encrypted rule file.
///
/// Returns the path written. Without `output` the file is named after
/// `date` in the current directory.
pub fn cmd_export(
    store: &Path,
    output: Option<&Path>,
    ids: &[String],
    date: &str,
    salt: [u8; 8],
) -> Result<PathBuf, String> {
    let settings = load_store(store)?;
    let selection = if ids.is_empty() { None } else { Some(ids) };
    let rules = select_for_export(&settings.rules, selection);

    if let Some(ids) = selection {
        let missing: Vec<_> = ids.iter().filter(|id| settings.rules.get(id).is_none()).collect();
        if !missing.is_empty() {
            eprintln!("Warning: unknown rule id(s): {:?}", missing);
        }
    }

    let payload = export_rules(&rules, salt).map_err(|e| e.to_string())?;
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(export_file_name(date)));
    fs::write(&path, payload).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;

    println!("Exported {} rule(s) to '{}'", rules.len(), path.display());
    Ok(path)
}

fn read_rule_file(input: &Path) -> Result<String, String> {
    let name = input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    check_file_name(&name).map_err(|e| e.to_string())?;
    fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input.display(), e))
}

/// Merge a rule file into the store, binding every rule to `page_url`.
/// Imported rules whose id is taken get a fresh id from `now_ms`.
pub fn cmd_import(store: &Path, input: &Path, page_url: &str, now_ms: u64) -> Result<(), String> {
    let payload = read_rule_file(input)?;
    let mut settings = load_store(store)?;

    let stats = merge_import(&mut settings.rules, &payload, page_url, now_ms).map_err(|e| format!("Import failed: {}", e))?;
    save_store(store, &settings)?;

    println!("Imported '{}' for {}", input.display(), page_url);
    println!("  Replaced:    {}", stats.replaced);
    println!("  Appended:    {}", stats.appended);
    if stats.renamed > 0 {
        println!("  Renamed:     {} (id already in use)", stats.renamed);
    }
    println!("  Total:       {}", settings.rules.len());
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleSummary<'a> {
    id: &'a str,
    name: &'a str,
    selector: &'a str,
    trigger_timing: &'static str,
    modify_mode: &'static str,
    disabled: bool,
}

impl<'a> From<&'a Rule> for RuleSummary<'a> {
    fn from(rule: &'a Rule) -> Self {
        Self {
            id: &rule.id,
            name: &rule.name,
            selector: &rule.selector,
            trigger_timing: rule.trigger_timing.as_str(),
            modify_mode: rule.modify_mode.as_str(),
            disabled: rule.disabled,
        }
    }
}

/// Decrypt a rule file and describe its contents without touching a store.
pub fn cmd_inspect(input: &Path, json: bool) -> Result<(), String> {
    let payload = read_rule_file(input)?;
    // URL is a placeholder; inspection never persists the result.
    let rules = import_rules(&payload, "").map_err(|e| format!("Invalid rule file: {}", e))?;

    if json {
        let summaries: Vec<RuleSummary> = rules.iter().map(RuleSummary::from).collect();
        let text = serde_json::to_string_pretty(&summaries).map_err(|e| format!("Failed to serialize: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    let plain = decrypt(&payload, PASSPHRASE).map_err(|e| e.to_string())?;
    println!("Rule file: {}", input.display());
    println!("  Payload:     {} bytes ({} bytes decrypted)", payload.len(), plain.len());
    println!("  Rules:       {}", rules.len());
    for rule in &rules {
        println!(
            "    [{}] {} {} ({}, {}{})",
            rule.id,
            rule.label(),
            rule.selector,
            rule.trigger_timing.as_str(),
            rule.modify_mode.as_str(),
            if rule.disabled { ", disabled" } else { "" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mr_core::ModifyMode;
    use crate::store_file::Store;

    const SALT: [u8; 8] = *b"01234567";
    const NOW: u64 = 1_800_000_000_000;

    fn seed_store(path: &Path) {
        let mut settings = Store::default();
        let mut a = Rule::new("1", "https://a.example/", "#title", "Hi");
        a.name = "Title".to_string();
        let mut b = Rule::new("2", "https://a.example/", ".price", "0");
        b.modify_mode = ModifyMode::Loop;
        settings.rules.upsert(a);
        settings.rules.upsert(b);
        save_store(path, &settings).expect("save");
    }

    #[test]
    fn test_export_import_between_stores() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("source.json");
        let target = dir.path().join("target.json");
        let file = dir.path().join("out.mrf");
        seed_store(&source);

        let written = cmd_export(&source, Some(&file), &[], "2024-05-01", SALT).expect("export");
        assert_eq!(written, file);

        cmd_import(&target, &file, "https://b.example/", NOW).expect("import");
        let imported = load_store(&target).expect("load");
        assert_eq!(imported.rules.len(), 2);
        assert!(imported.rules.iter().all(|r| r.url == "https://b.example/"));
        assert_eq!(imported.rules.get("2").map(|r| r.modify_mode), Some(ModifyMode::Loop));
    }

    #[test]
    fn test_export_selection() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("source.json");
        let file = dir.path().join("one.mrf");
        seed_store(&source);

        cmd_export(&source, Some(&file), &["2".to_string()], "2024-05-01", SALT).expect("export");
        let rules = import_rules(&fs::read_to_string(&file).expect("read"), "u").expect("decrypt");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "2");

        let err = cmd_export(&source, Some(&file), &["nope".to_string()], "2024-05-01", SALT).unwrap_err();
        assert_eq!(err, "No rules to export");
    }

    #[test]
    fn test_import_rejects_other_extensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = dir.path().join("store.json");
        let file = dir.path().join("rules.json");
        fs::write(&file, "[]").expect("write");

        let err = cmd_import(&store, &file, "u", NOW).unwrap_err();
        assert!(err.contains("expected .mrf"));
        assert!(!store.exists());
    }

    #[test]
    fn test_failed_import_keeps_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = dir.path().join("store.json");
        let file = dir.path().join("broken.mrf");
        seed_store(&store);
        let before = fs::read_to_string(&store).expect("read");
        fs::write(&file, "U2FsdGVkX1-not-a-real-payload").expect("write");

        assert!(cmd_import(&store, &file, "u", NOW).unwrap_err().starts_with("Import failed"));
        assert_eq!(fs::read_to_string(&store).expect("read"), before);
    }

    #[test]
    fn test_inspect() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("source.json");
        let file = dir.path().join("out.mrf");
        seed_store(&source);
        cmd_export(&source, Some(&file), &[], "2024-05-01", SALT).expect("export");

        cmd_inspect(&file, false).expect("inspect");
        cmd_inspect(&file, true).expect("inspect json");
    }

    #[test]
    fn test_reimport_into_source_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = dir.path().join("store.json");
        let file = dir.path().join("out.mrf");
        seed_store(&store);

        cmd_export(&store, Some(&file), &[], "2024-05-01", SALT).expect("export");
        cmd_import(&store, &file, "https://b.example/", NOW).expect("import");

        let text = fs::read_to_string(&store).expect("read");
        let raw: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(raw["rules"].as_array().map(Vec::len), Some(4));

        let settings = load_store(&store).expect("load");
        assert!(settings.retained.is_empty());
        assert_eq!(settings.rules.for_url("https://a.example/").count(), 2);
        assert_eq!(settings.rules.for_url("https://b.example/").count(), 2);
    }
}
