//! Rule store management commands.

use std::fs;
use std::path::Path;

use mr_core::{ModifyMode, Rule, RuleFilter, StatusFilter, TriggerTiming};

use crate::store_file::{load_store, save_store};

/// Fields accepted by `add` and `edit`. `None` keeps the current value.
#[derive(Debug, Default, Clone)]
pub struct RuleFields {
    pub name: Option<String>,
    pub url: Option<String>,
    pub selector: Option<String>,
    pub content: Option<String>,
    pub color: Option<String>,
    pub timing: Option<String>,
    pub mode: Option<String>,
}

fn parse_timing(s: &str) -> Result<TriggerTiming, String> {
    TriggerTiming::from_str(s).ok_or_else(|| format!("Unknown trigger timing '{}' (expected immediate or onload)", s))
}

fn parse_mode(s: &str) -> Result<ModifyMode, String> {
    ModifyMode::from_str(s).ok_or_else(|| format!("Unknown modify mode '{}' (expected once or loop)", s))
}

fn parse_status(s: &str) -> Result<StatusFilter, String> {
    match s {
        "active" => Ok(StatusFilter::Active),
        "inactive" => Ok(StatusFilter::Inactive),
        _ => Err(format!("Unknown status '{}' (expected active or inactive)", s)),
    }
}

fn apply_fields(rule: &mut Rule, fields: RuleFields) -> Result<(), String> {
    if let Some(name) = fields.name {
        rule.name = name;
    }
    if let Some(url) = fields.url {
        rule.url = url;
    }
    if let Some(selector) = fields.selector {
        rule.selector = selector;
    }
    if let Some(content) = fields.content {
        rule.new_content = content;
    }
    if let Some(color) = fields.color {
        // An empty color turns the override off.
        rule.enable_color = !color.is_empty();
        rule.text_color = if color.is_empty() { None } else { Some(color) };
    }
    if let Some(timing) = fields.timing {
        rule.trigger_timing = parse_timing(&timing)?;
    }
    if let Some(mode) = fields.mode {
        rule.modify_mode = parse_mode(&mode)?;
    }
    rule.validate().map_err(|e| e.to_string())
}

/// Create a rule with id `id` and return it.
pub fn cmd_add(store: &Path, id: String, fields: RuleFields) -> Result<Rule, String> {
    let mut settings = load_store(store)?;
    if settings.rules.get(&id).is_some() {
        return Err(format!("Rule '{}' already exists", id));
    }

    let mut rule = Rule::new(id, "", "", "");
    apply_fields(&mut rule, fields)?;
    settings.rules.upsert(rule.clone());
    save_store(store, &settings)?;

    println!("Added rule {} ({} on {})", rule.id, rule.selector, rule.url);
    Ok(rule)
}

pub fn cmd_edit(store: &Path, id: &str, fields: RuleFields) -> Result<(), String> {
    let mut settings = load_store(store)?;
    let mut rule = settings
        .rules
        .get(id)
        .cloned()
        .ok_or_else(|| format!("No rule with id '{}'", id))?;

    apply_fields(&mut rule, fields)?;
    settings.rules.upsert(rule);
    save_store(store, &settings)?;

    println!("Updated rule {}", id);
    Ok(())
}

pub fn cmd_list(
    store: &Path,
    search: Option<String>,
    mode: Option<&str>,
    status: Option<&str>,
    url: Option<&str>,
    json: bool,
) -> Result<usize, String> {
    let settings = load_store(store)?;
    let filter = RuleFilter {
        search,
        mode: mode.map(parse_mode).transpose()?,
        status: status.map(parse_status).transpose()?,
    };

    let rules: Vec<&Rule> = settings
        .rules
        .filter(&filter)
        .filter(|rule| url.map_or(true, |url| rule.applies_to(url)))
        .collect();

    if json {
        let text = serde_json::to_string_pretty(&rules).map_err(|e| format!("Failed to serialize: {}", e))?;
        println!("{}", text);
        return Ok(rules.len());
    }

    println!(
        "{} of {} rule(s), force loop {}",
        rules.len(),
        settings.rules.len(),
        if settings.force_loop_enabled { "on" } else { "off" }
    );
    for rule in &rules {
        println!(
            "  [{}] {}{}",
            rule.id,
            rule.label(),
            if rule.disabled { " (disabled)" } else { "" }
        );
        println!("      url:      {}", rule.url);
        println!("      selector: {}", rule.selector);
        println!(
            "      timing:   {}, mode: {}{}",
            rule.trigger_timing.as_str(),
            rule.modify_mode.as_str(),
            rule.color_override().map(|c| format!(", color: {}", c)).unwrap_or_default()
        );
    }
    Ok(rules.len())
}

pub fn cmd_set_disabled(store: &Path, ids: &[String], disabled: bool) -> Result<(), String> {
    if ids.is_empty() {
        return Err("No rule ids given".to_string());
    }
    let mut settings = load_store(store)?;
    let changed = settings.rules.set_disabled(ids, disabled);
    save_store(store, &settings)?;

    println!("{} {} rule(s)", if disabled { "Disabled" } else { "Enabled" }, changed);
    Ok(())
}

pub fn cmd_delete(store: &Path, ids: &[String]) -> Result<(), String> {
    if ids.is_empty() {
        return Err("No rule ids given".to_string());
    }
    let mut settings = load_store(store)?;
    let removed = settings.rules.remove_many(ids);
    save_store(store, &settings)?;

    println!("Deleted {} rule(s), {} left", removed, settings.rules.len());
    Ok(())
}

pub fn cmd_force_loop(store: &Path, state: &str) -> Result<(), String> {
    let enabled = match state {
        "on" => true,
        "off" => false,
        _ => return Err(format!("Expected 'on' or 'off', got '{}'", state)),
    };
    let mut settings = load_store(store)?;
    settings.force_loop_enabled = enabled;
    save_store(store, &settings)?;

    println!("Force loop {}", state);
    Ok(())
}

/// Check every record in a store file, reporting the ones the extension would drop.
pub fn cmd_validate(store: &Path) -> Result<(), String> {
    let text = fs::read_to_string(store).map_err(|e| format!("Failed to read '{}': {}", store.display(), e))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| format!("Invalid store '{}': {}", store.display(), e))?;

    let records = match value.get("rules") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(records)) => records.clone(),
        Some(_) => return Err("'rules' is not an array".to_string()),
    };

    let mut invalid = 0usize;
    let mut seen: Vec<String> = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        match Rule::from_value(record) {
            Ok(rule) if seen.contains(&rule.id) => {
                println!("  #{}: id {} is already used by an earlier rule", index, rule.id);
                invalid += 1;
            }
            Ok(rule) => seen.push(rule.id),
            Err(e) => {
                println!("  #{}: {}", index, e);
                invalid += 1;
            }
        }
    }

    if invalid > 0 {
        return Err(format!("{} invalid rule(s) in '{}'", invalid, store.display()));
    }
    println!("Store '{}' is valid", store.display());
    Ok(())
}
