//! WebAssembly bindings for Modifier
//!
//! `ContentScript` runs the rule engine inside a page. The free functions
//! back the popup and rule manager: rule ids, export, import.

mod dom;
mod host;

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use mr_core::{
    engine::{DispatchOutcome, RuleEngine, RuleOutcome},
    EngineMessage, MergeStats, Rule, RuleRecords, StoredSettings,
};
use mr_rulefile::{check_file_name, export_file_name as file_name_for, export_rules as encrypt_rules, merge_import, select_for_export};

use crate::host::{BrowserHost, Runtime, SharedRuntime};

pub use crate::dom::{BrowserDocument, BrowserElement};

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn stringify(value: &JsValue) -> Result<String, JsValue> {
    js_sys::JSON::stringify(value).map(String::from)
}

fn parse(text: &str) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(text)
}

/// Split a stored rule array into usable rules and records kept verbatim.
fn parse_records(text: &str) -> Result<RuleRecords, String> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(text).map_err(|e| format!("Invalid rules: {}", e))?;
    Ok(RuleRecords::from_values(values))
}

/// Merge a rule file into the stored rule array `existing` (JSON).
///
/// Records that are not usable rules pass through untouched, so only the
/// rule file itself can make the import fail.
fn merge_into_records(existing: &str, payload: &str, page_url: &str, now_ms: u64) -> Result<(String, MergeStats), String> {
    let mut records = parse_records(existing)?;
    let stats = merge_import(&mut records.rules, payload, page_url, now_ms).map_err(|e| e.to_string())?;
    let values = records.to_values().map_err(|e| e.to_string())?;
    let json = serde_json::to_string(&values).map_err(|e| e.to_string())?;
    Ok((json, stats))
}

fn array_json(value: &JsValue) -> Result<String, JsValue> {
    if value.is_undefined() || value.is_null() {
        Ok("[]".to_string())
    } else {
        stringify(value)
    }
}

/// Ids from a JS array of strings; `undefined` and `null` mean "all".
fn optional_ids(value: &JsValue) -> Option<Vec<String>> {
    if value.is_undefined() || value.is_null() {
        return None;
    }
    Some(js_sys::Array::from(value).iter().filter_map(|v| v.as_string()).collect())
}

fn applied_count(outcomes: &[RuleOutcome]) -> u32 {
    outcomes
        .iter()
        .filter(|o| matches!(o.outcome, DispatchOutcome::Applied { .. } | DispatchOutcome::Forced { .. }))
        .count() as u32
}

/// The in-page engine bound to the current window.
#[wasm_bindgen]
pub struct ContentScript {
    runtime: SharedRuntime,
}

#[wasm_bindgen]
impl ContentScript {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<ContentScript, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        let document = window.document().ok_or_else(|| JsValue::from_str("No document"))?;
        let page_url = window.location().href()?;
        let started_at = js_sys::Date::now() as u64;

        let runtime = Rc::new_cyclic(|weak| {
            RefCell::new(Runtime {
                engine: RuleEngine::new(page_url, started_at),
                host: BrowserHost::new(window, document, weak.clone()),
            })
        });
        Ok(ContentScript { runtime })
    }

    /// Start from the stored settings object (`{ rules, forceLoopEnabled }`).
    /// Returns the number of rules written during the initial pass.
    pub fn load(&self, stored: JsValue) -> Result<u32, JsValue> {
        let text = if stored.is_undefined() || stored.is_null() {
            "{}".to_string()
        } else {
            stringify(&stored)?
        };
        let settings = StoredSettings::from_json(&text).map_err(to_js)?;

        let mut guard = self.runtime.try_borrow_mut().map_err(|_| JsValue::from_str("Engine busy"))?;
        let Runtime { engine, host } = &mut *guard;
        let outcomes = engine.start(host, settings);
        Ok(applied_count(&outcomes))
    }

    /// Handle an `UPDATE_SETTINGS` or `UPDATE_FORCE_LOOP` message object.
    pub fn handle_message(&self, message: JsValue) -> Result<u32, JsValue> {
        let text = stringify(&message)?;
        let message = EngineMessage::from_json(&text).map_err(to_js)?;

        let mut guard = self.runtime.try_borrow_mut().map_err(|_| JsValue::from_str("Engine busy"))?;
        let Runtime { engine, host } = &mut *guard;
        let outcomes = engine.handle_message(host, message);
        Ok(applied_count(&outcomes))
    }

    /// Detach the observer and stop the force loop.
    pub fn shutdown(&self) {
        match self.runtime.try_borrow_mut() {
            Ok(mut guard) => {
                let Runtime { engine, host } = &mut *guard;
                engine.shutdown(host);
            }
            Err(_) => log::warn!("Engine busy, shutdown skipped"),
        }
    }

    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.runtime
            .try_borrow()
            .map(|guard| guard.engine.state().as_str().to_string())
            .unwrap_or_else(|_| "busy".to_string())
    }
}

/// Id for a newly created rule.
#[wasm_bindgen]
pub fn new_rule_id() -> String {
    Rule::generate_id(js_sys::Date::now() as u64)
}

/// Check a rule object before it is saved.
#[wasm_bindgen]
pub fn validate_rule(rule: JsValue) -> Result<(), JsValue> {
    let text = stringify(&rule)?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(to_js)?;
    Rule::from_value(value).map(|_| ()).map_err(to_js)
}

/// Default export file name for today (UTC).
#[wasm_bindgen]
pub fn export_file_name() -> String {
    let iso = String::from(js_sys::Date::new_0().to_iso_string());
    file_name_for(iso.get(..10).unwrap_or(&iso))
}

/// Encrypt `rules` (or the subset named by `selected_ids`) to a rule file payload.
#[wasm_bindgen]
pub fn export_rules(rules: JsValue, selected_ids: JsValue) -> Result<String, JsValue> {
    let records = parse_records(&array_json(&rules)?).map_err(|e| JsValue::from_str(&e))?;
    let ids = optional_ids(&selected_ids);
    let selected = select_for_export(&records.rules, ids.as_deref());

    let mut salt = [0u8; 8];
    for byte in salt.iter_mut() {
        *byte = (js_sys::Math::random() * 256.0) as u8;
    }
    encrypt_rules(&selected, salt).map_err(to_js)
}

/// Decrypt a rule file, bind it to `page_url` and merge it into `existing`.
///
/// Returns `{ rules, replaced, appended, renamed }`; on error nothing is merged.
#[wasm_bindgen]
pub fn import_rules(file_name: &str, payload: &str, page_url: &str, existing: JsValue) -> Result<JsValue, JsValue> {
    check_file_name(file_name).map_err(to_js)?;

    let (rules_json, stats) = merge_into_records(&array_json(&existing)?, payload, page_url, js_sys::Date::now() as u64)
        .map_err(|e| JsValue::from_str(&e))?;

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"rules".into(), &parse(&rules_json)?);
    let _ = js_sys::Reflect::set(&result, &"replaced".into(), &JsValue::from(stats.replaced as u32));
    let _ = js_sys::Reflect::set(&result, &"appended".into(), &JsValue::from(stats.appended as u32));
    let _ = js_sys::Reflect::set(&result, &"renamed".into(), &JsValue::from(stats.renamed as u32));
    Ok(result.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mr_core::RuleSet;

    #[test]
    fn test_parse_records_keeps_unusable() {
        let records =
            parse_records(r##"[{"id":"1","url":"u","selector":"#a","newContent":"x"},{"id":"2"}]"##).expect("valid");
        assert_eq!(records.rules.len(), 1);
        assert_eq!(records.retained.len(), 1);
        assert!(parse_records("{}").is_err());
    }

    #[test]
    fn test_merge_keeps_existing_records() {
        let source = RuleSet::from_rules([Rule::new("1", "https://a.example/", "#title", "Hi")]);
        let payload = mr_rulefile::export_rules(source.as_slice(), *b"saltsalt").expect("export");
        let existing = r##"[
            {"id":"1","url":"https://a.example/","selector":"#title","newContent":"Hi"},
            {"id":"2","selector":"","newContent":"draft"}
        ]"##;

        let (json, stats) = merge_into_records(existing, &payload, "https://b.example/", 5_000).expect("merge");
        assert_eq!(stats.appended, 1);
        assert_eq!(stats.renamed, 1);

        let merged: Vec<serde_json::Value> = serde_json::from_str(&json).expect("json");
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0]["url"], "https://a.example/");
        assert_eq!(merged[1]["id"], "5000");
        assert_eq!(merged[1]["url"], "https://b.example/");
        assert_eq!(merged[2]["newContent"], "draft");
    }

    #[test]
    fn test_merge_fails_only_on_bad_payload() {
        assert!(merge_into_records("[]", "not a rule file", "u", 0).is_err());
        assert!(merge_into_records("{}", "", "u", 0).unwrap_err().starts_with("Invalid rules"));
    }

    #[test]
    fn test_applied_count() {
        let outcomes = vec![
            RuleOutcome { rule_id: "1".into(), outcome: DispatchOutcome::Applied { frame_index: 0 } },
            RuleOutcome { rule_id: "2".into(), outcome: DispatchOutcome::NotFound },
            RuleOutcome { rule_id: "3".into(), outcome: DispatchOutcome::Forced { frame_index: 1 } },
        ];
        assert_eq!(applied_count(&outcomes), 2);
    }
}
