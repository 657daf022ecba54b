//! Inbound messages from the popup and the rule manager.

use serde::{Deserialize, Serialize};

use crate::rule::{Rule, RuleError};

/// Error type for message decoding.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Invalid message JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid rule in message: {0}")]
    InvalidRule(#[from] RuleError),
}

/// A message delivered to the content script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type")]
pub enum EngineMessage {
    /// A rule was created or edited; upsert by id
    #[serde(rename = "UPDATE_SETTINGS")]
    UpdateSettings { settings: Rule },
    /// The global forced-loop toggle changed
    #[serde(rename = "UPDATE_FORCE_LOOP")]
    UpdateForceLoop { enabled: bool },
}

impl EngineMessage {
    /// Decode and validate a message.
    pub fn from_json(text: &str) -> Result<Self, MessageError> {
        let message: EngineMessage = serde_json::from_str(text)?;
        if let EngineMessage::UpdateSettings { settings } = &message {
            settings.validate()?;
        }
        Ok(message)
    }
}
