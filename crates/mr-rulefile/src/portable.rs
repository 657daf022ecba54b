//! Export and import of rule sets.
//!
//! Exported rules lose their `url`; importing onto a page attaches that
//! page's URL to every record and merges into the store by
//! `(selector, url)`. An import either succeeds as a whole or leaves the
//! store untouched.

use serde_json::Value;

use mr_core::rule::{Rule, RuleError};
use mr_core::ruleset::{MergeStats, RuleSet};

use crate::cipher::{decrypt, encrypt, CipherError};

/// Static passphrase shared by every installation.
pub const PASSPHRASE: &str = "modifier-rules-v1";
/// Rule file extension, without the dot.
pub const FILE_EXTENSION: &str = "mrf";

/// Error type for rule file export and import.
#[derive(Debug, thiserror::Error)]
pub enum RuleFileError {
    #[error("No rules to export")]
    NothingToExport,
    #[error("Not a rule file (expected .mrf): {0}")]
    WrongExtension(String),
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error("File could not be decrypted, it may not be a rule file")]
    EmptyPlaintext,
    #[error("Decrypted payload is not UTF-8")]
    Utf8,
    #[error("Invalid rule JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid rule format: expected an array")]
    NotAnArray,
    #[error("Invalid rule #{index}: {source}")]
    InvalidRecord { index: usize, source: RuleError },
}

/// Default file name for an export made on `date` (`YYYY-MM-DD`).
pub fn export_file_name(date: &str) -> String {
    format!("modifier-rules-{}.{}", date, FILE_EXTENSION)
}

/// Refuse files that do not carry the rule file extension.
pub fn check_file_name(name: &str) -> Result<(), RuleFileError> {
    let suffix = format!(".{}", FILE_EXTENSION);
    if name.ends_with(&suffix) {
        Ok(())
    } else {
        Err(RuleFileError::WrongExtension(name.to_string()))
    }
}

/// Every rule, or only those whose id is listed, in store order.
pub fn select_for_export(rules: &RuleSet, ids: Option<&[String]>) -> Vec<Rule> {
    rules
        .iter()
        .filter(|rule| ids.map_or(true, |ids| ids.contains(&rule.id)))
        .cloned()
        .collect()
}

/// Serialize `rules` without their URLs and encrypt the result.
pub fn export_rules(rules: &[Rule], salt: [u8; 8]) -> Result<String, RuleFileError> {
    if rules.is_empty() {
        return Err(RuleFileError::NothingToExport);
    }

    let mut records = Vec::with_capacity(rules.len());
    for rule in rules {
        let mut value = serde_json::to_value(rule)?;
        if let Value::Object(fields) = &mut value {
            fields.remove("url");
        }
        records.push(value);
    }

    let json = serde_json::to_string(&records)?;
    log::info!("Exported {} rule(s)", rules.len());
    Ok(encrypt(json.as_bytes(), PASSPHRASE, salt))
}

/// Decrypt a rule file and bind every record to `page_url`.
pub fn import_rules(payload: &str, page_url: &str) -> Result<Vec<Rule>, RuleFileError> {
    let plain = decrypt(payload, PASSPHRASE)?;
    if plain.is_empty() {
        return Err(RuleFileError::EmptyPlaintext);
    }
    let text = String::from_utf8(plain).map_err(|_| RuleFileError::Utf8)?;

    let records = match serde_json::from_str::<Value>(&text)? {
        Value::Array(records) => records,
        _ => return Err(RuleFileError::NotAnArray),
    };

    let mut rules = Vec::with_capacity(records.len());
    for (index, mut record) in records.into_iter().enumerate() {
        if let Value::Object(fields) = &mut record {
            fields.insert("url".to_string(), Value::String(page_url.to_string()));
        }
        let rule = Rule::from_value(record).map_err(|source| RuleFileError::InvalidRecord { index, source })?;
        rules.push(rule);
    }

    log::info!("Decrypted {} rule(s) for {}", rules.len(), page_url);
    Ok(rules)
}

/// Import a rule file into `store`. On error the store is not modified.
///
/// `now_ms` seeds fresh ids for imported rules whose id is already taken.
pub fn merge_import(store: &mut RuleSet, payload: &str, page_url: &str, now_ms: u64) -> Result<MergeStats, RuleFileError> {
    let rules = import_rules(payload, page_url)?;
    let stats = store.merge_by_location(rules, now_ms);
    log::info!(
        "Imported rules: {} replaced, {} appended ({} renamed), {} total",
        stats.replaced,
        stats.appended,
        stats.renamed,
        store.len()
    );
    Ok(stats)
}
