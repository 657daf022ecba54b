//! Modifier Core Library
//!
//! This crate provides the in-page rule execution engine for the Modifier
//! content rewriter. Rules replace the content (and optionally the text
//! color) of the first element matched by a selector on one page, either
//! once or continuously while the page mutates.
//!
//! # Architecture
//!
//! The engine is host-agnostic. A host (the wasm content script, or a test
//! double) supplies documents and elements through the [`dom`] traits and
//! drives the engine by calling its entry points from a single thread:
//! start, message, mutation batch, timer tick, load, shutdown.
//!
//! # Modules
//!
//! - `rule`: Rule records and validation
//! - `ruleset`: Ordered rule collection and the stored settings blob
//! - `message`: Inbound messages from the popup and rule manager
//! - `throttle`: Per-rule rate limiting for `loop` rules
//! - `dom`: Document/element abstraction implemented by hosts
//! - `frames`: Frame enumeration and cross-frame selector resolution
//! - `applier`: Element mutation
//! - `diagnostics`: Hit/miss diagnostics for log output
//! - `engine`: The observer/timer state machine

pub mod rule;
pub mod ruleset;
pub mod message;
pub mod throttle;
pub mod dom;
pub mod frames;
pub mod applier;
pub mod diagnostics;
pub mod engine;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use rule::{ModifyMode, Rule, RuleError, TriggerTiming};
pub use ruleset::{MergeStats, RuleFilter, RuleRecords, RuleSet, StatusFilter, StoredSettings};
pub use message::{EngineMessage, MessageError};
pub use throttle::{ThrottleConfig, ThrottleRegistry};
pub use dom::{DocumentContext, DomError, ElementHandle, FrameAccess, FrameInfo, ObserveOptions};
pub use frames::FrameLocator;
pub use applier::{ApplyOutcome, ContentApplier};
pub use engine::{DispatchOutcome, EngineConfig, EngineHost, EngineState, HostError, RuleEngine, RuleOutcome};
