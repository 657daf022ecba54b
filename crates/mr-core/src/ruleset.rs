//! Ordered rule collection and the stored settings blob.
//!
//! Insertion order is significant: the engine evaluates rules in the order
//! they appear here, and an upsert keeps a replaced rule in its slot.

use serde::{Deserialize, Serialize};

use crate::rule::{ModifyMode, Rule};

/// Result of [`RuleSet::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Counts from [`RuleSet::merge_by_location`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    pub replaced: usize,
    pub appended: usize,
    /// Incoming rules given a fresh id because theirs was taken
    pub renamed: usize,
}

/// Active/inactive filter for rule listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Active,
    Inactive,
}

/// Listing filter, mirroring the search box and dropdowns of the rule manager.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    /// Case-insensitive substring over name, URL and selector
    pub search: Option<String>,
    pub mode: Option<ModifyMode>,
    pub status: Option<StatusFilter>,
}

impl RuleFilter {
    pub fn matches(&self, rule: &Rule) -> bool {
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = rule.name.to_lowercase().contains(&needle)
                || rule.url.to_lowercase().contains(&needle)
                || rule.selector.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        if let Some(mode) = self.mode {
            if rule.modify_mode != mode {
                return false;
            }
        }
        match self.status {
            Some(StatusFilter::Active) => !rule.disabled,
            Some(StatusFilter::Inactive) => rule.disabled,
            None => true,
        }
    }
}

/// Rules in insertion order, unique by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records, keeping the last record for a repeated id in the
    /// slot of the first.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut set = Self::new();
        for rule in rules {
            set.upsert(rule);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn as_slice(&self) -> &[Rule] {
        &self.rules
    }

    pub fn into_vec(self) -> Vec<Rule> {
        self.rules
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Replace the rule with the same id in place, or append.
    pub fn upsert(&mut self, rule: Rule) -> Upsert {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(slot) => {
                *slot = rule;
                Upsert::Replaced
            }
            None => {
                self.rules.push(rule);
                Upsert::Inserted
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Rule> {
        let index = self.rules.iter().position(|r| r.id == id)?;
        Some(self.rules.remove(index))
    }

    /// Delete every rule whose id is listed. Returns the number removed.
    pub fn remove_many(&mut self, ids: &[String]) -> usize {
        let before = self.rules.len();
        self.rules.retain(|r| !ids.contains(&r.id));
        before - self.rules.len()
    }

    /// Set `disabled` on every listed rule. Returns the number touched.
    pub fn set_disabled(&mut self, ids: &[String], disabled: bool) -> usize {
        let mut touched = 0;
        for rule in self.rules.iter_mut().filter(|r| ids.contains(&r.id)) {
            rule.disabled = disabled;
            touched += 1;
        }
        touched
    }

    /// Rules whose URL equals `page_url`, in order.
    pub fn for_url<'a>(&'a self, page_url: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.applies_to(page_url))
    }

    pub fn filter<'a>(&'a self, filter: &'a RuleFilter) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| filter.matches(r))
    }

    /// Merge imported rules by `(selector, url)`: a match is replaced,
    /// anything else is appended.
    ///
    /// Ids stay unique: an incoming rule whose id belongs to a rule at
    /// another location gets a fresh time-based id starting at `now_ms`.
    pub fn merge_by_location(&mut self, incoming: impl IntoIterator<Item = Rule>, now_ms: u64) -> MergeStats {
        let mut stats = MergeStats::default();
        let mut next_id = now_ms;
        for mut rule in incoming {
            let slot = self
                .rules
                .iter()
                .position(|r| r.selector == rule.selector && r.url == rule.url);
            let taken = self
                .rules
                .iter()
                .enumerate()
                .any(|(index, r)| Some(index) != slot && r.id == rule.id);
            if taken {
                let fresh = self.fresh_id(&mut next_id);
                log::debug!("Imported rule {} renamed to {}", rule.id, fresh);
                rule.id = fresh;
                stats.renamed += 1;
            }

            match slot {
                Some(index) => {
                    self.rules[index] = rule;
                    stats.replaced += 1;
                }
                None => {
                    self.rules.push(rule);
                    stats.appended += 1;
                }
            }
        }
        stats
    }

    fn fresh_id(&self, next: &mut u64) -> String {
        loop {
            let id = Rule::generate_id(*next);
            *next += 1;
            if self.get(&id).is_none() {
                return id;
            }
        }
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// The settings blob read from the synced store at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSettings {
    pub rules: RuleSet,
    pub force_loop_enabled: bool,
}

/// A stored `rules` array split into rules the engine can run and records
/// it cannot: invalid ones, or ones whose id was already taken. The latter
/// are kept verbatim so a writer can put them back untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleRecords {
    pub rules: RuleSet,
    pub retained: Vec<serde_json::Value>,
}

impl RuleRecords {
    pub fn from_values(values: impl IntoIterator<Item = serde_json::Value>) -> Self {
        let mut records = Self::default();
        for (index, value) in values.into_iter().enumerate() {
            match Rule::from_value(value.clone()) {
                Ok(rule) if records.rules.get(&rule.id).is_none() => {
                    records.rules.upsert(rule);
                }
                Ok(rule) => {
                    log::warn!("Stored rule #{} reuses id {}", index, rule.id);
                    records.retained.push(value);
                }
                Err(e) => {
                    log::warn!("Stored rule #{} is invalid: {}", index, e);
                    records.retained.push(value);
                }
            }
        }
        records
    }

    /// Rules in order, then the retained records unchanged.
    pub fn to_values(&self) -> Result<Vec<serde_json::Value>, serde_json::Error> {
        let mut values = Vec::with_capacity(self.rules.len() + self.retained.len());
        for rule in &self.rules {
            values.push(serde_json::to_value(rule)?);
        }
        values.extend(self.retained.iter().cloned());
        Ok(values)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    #[serde(default)]
    rules: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    force_loop_enabled: Option<bool>,
}

impl StoredSettings {
    /// Parse the store blob. Records the engine cannot run are skipped.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawSettings = serde_json::from_str(text)?;
        let records = RuleRecords::from_values(raw.rules.unwrap_or_default());
        if !records.retained.is_empty() {
            log::warn!("Skipping {} stored record(s)", records.retained.len());
        }
        Ok(Self {
            rules: records.rules,
            force_loop_enabled: raw.force_loop_enabled.unwrap_or(false),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
