//! Rule records
//!
//! A rule binds a selector on one exact page URL to replacement markup and
//! an optional text color. Records come from the synced settings store and
//! from the popup's `UPDATE_SETTINGS` message; both paths go through
//! [`Rule::validate`] before the engine sees them.

use serde::{Deserialize, Serialize};

/// Error type for rule validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("Rule has no id")]
    MissingId,
    #[error("Rule {0} has no selector")]
    MissingSelector(String),
    #[error("Malformed rule record: {0}")]
    Malformed(String),
}

/// When a rule first fires after being loaded or received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum TriggerTiming {
    /// Fire synchronously as soon as the rule is dispatched
    #[default]
    Immediate,
    /// Fire once the page's load event has completed
    Onload,
}

/// Whether a rule is applied once or kept applied as the page mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum ModifyMode {
    /// Exempt from throttling and from re-application
    #[default]
    Once,
    /// Re-applied on every observed mutation (throttled) and on forced ticks
    Loop,
}

impl ModifyMode {
    /// Parse from the strings used by the rule form.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "once" => Some(Self::Once),
            "loop" => Some(Self::Loop),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Loop => "loop",
        }
    }
}

impl TriggerTiming {
    /// Parse from the strings used by the rule form.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "immediate" => Some(Self::Immediate),
            "onload" => Some(Self::Onload),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Onload => "onload",
        }
    }
}

/// A persisted content rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique identifier, assigned once at creation
    pub id: String,
    /// Display label
    #[serde(default)]
    pub name: String,
    /// Exact page URL the rule applies to
    #[serde(default)]
    pub url: String,
    /// CSS selector resolved against the page and its same-origin frames
    #[serde(default)]
    pub selector: String,
    /// Markup that replaces the matched element's inner content
    #[serde(default)]
    pub new_content: String,
    #[serde(default)]
    pub enable_color: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default)]
    pub trigger_timing: TriggerTiming,
    #[serde(default)]
    pub modify_mode: ModifyMode,
    #[serde(default)]
    pub disabled: bool,
}

impl Rule {
    /// Create an enabled rule with default timing and mode.
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        selector: impl Into<String>,
        new_content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            url: url.into(),
            selector: selector.into(),
            new_content: new_content.into(),
            enable_color: false,
            text_color: None,
            trigger_timing: TriggerTiming::default(),
            modify_mode: ModifyMode::default(),
            disabled: false,
        }
    }

    /// Ids are the decimal millisecond timestamp of creation.
    pub fn generate_id(now_ms: u64) -> String {
        now_ms.to_string()
    }

    /// Parse a single record from JSON and validate it.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RuleError> {
        let rule: Rule =
            serde_json::from_value(value).map_err(|e| RuleError::Malformed(e.to_string()))?;
        rule.validate()?;
        Ok(rule)
    }

    /// Check the fields the engine cannot work without.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.id.trim().is_empty() {
            return Err(RuleError::MissingId);
        }
        if self.selector.trim().is_empty() {
            return Err(RuleError::MissingSelector(self.id.clone()));
        }
        Ok(())
    }

    /// Color to write, if the override is enabled and a color is set.
    pub fn color_override(&self) -> Option<&str> {
        if !self.enable_color {
            return None;
        }
        self.text_color.as_deref().filter(|c| !c.is_empty())
    }

    #[inline]
    pub fn is_loop(&self) -> bool {
        self.modify_mode == ModifyMode::Loop
    }

    #[inline]
    pub fn applies_to(&self, page_url: &str) -> bool {
        self.url == page_url
    }

    /// Label for log lines.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}
