//! Element mutation.
//!
//! The only side effect of an apply is on the one resolved element: its
//! inner markup and, when the rule asks for it, its inline text color.

use crate::dom::ElementHandle;
use crate::rule::Rule;
use crate::throttle::{ThrottleDecision, ThrottleRegistry};

const PREVIEW_CHARS: usize = 100;

/// Why an apply did not mutate anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingElement,
    MissingContent,
    Throttled(ThrottleDecision),
}

/// Result of an apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied {
        /// Content differed from the replacement before the write
        content_changed: bool,
        color_set: bool,
    },
    Skipped(SkipReason),
}

impl ApplyOutcome {
    #[inline]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Writes rule content into elements, consulting the throttle first.
pub struct ContentApplier<'a> {
    throttle: &'a mut ThrottleRegistry,
}

impl<'a> ContentApplier<'a> {
    pub fn new(throttle: &'a mut ThrottleRegistry) -> Self {
        Self { throttle }
    }

    /// Throttled path. Fails closed on a missing element or empty content;
    /// a throttle denial leaves both the element and the throttle untouched.
    pub fn apply<E: ElementHandle>(&mut self, element: Option<&E>, rule: &Rule, now: u64) -> ApplyOutcome {
        let element = match element {
            Some(element) => element,
            None => {
                log::warn!("Apply skipped for rule {}: no element", rule.label());
                return ApplyOutcome::Skipped(SkipReason::MissingElement);
            }
        };
        if rule.new_content.is_empty() {
            log::warn!("Apply skipped for rule {}: no content", rule.label());
            return ApplyOutcome::Skipped(SkipReason::MissingContent);
        }

        let decision = self.throttle.check(&rule.id, rule.modify_mode, now);
        match decision {
            ThrottleDecision::Allowed(_) => {}
            ThrottleDecision::TooSoon { since_last_ms } => {
                log::warn!(
                    "Rule {} throttled: {}ms since last modification (min {}ms)",
                    rule.label(),
                    since_last_ms,
                    self.throttle.config().min_interval_ms
                );
                return ApplyOutcome::Skipped(SkipReason::Throttled(decision));
            }
            ThrottleDecision::WindowExhausted { count, resets_in_ms } => {
                log::warn!(
                    "Rule {} hit {} modifications this window, resets in {}s",
                    rule.label(),
                    count,
                    resets_in_ms.div_ceil(1000)
                );
                return ApplyOutcome::Skipped(SkipReason::Throttled(decision));
            }
        }

        let outcome = write(element, rule);
        self.throttle.record(&rule.id, rule.modify_mode, now);

        log::info!(
            "Modified '{}' for rule {} ({}): {}",
            rule.selector,
            rule.label(),
            rule.modify_mode.as_str(),
            preview(&rule.new_content)
        );
        outcome
    }
}

/// Forced path: writes without consulting or updating the throttle.
pub fn apply_forced<E: ElementHandle>(element: &E, rule: &Rule) -> ApplyOutcome {
    if rule.new_content.is_empty() {
        return ApplyOutcome::Skipped(SkipReason::MissingContent);
    }
    write(element, rule)
}

fn write<E: ElementHandle>(element: &E, rule: &Rule) -> ApplyOutcome {
    let old_content = element.inner_html();
    element.set_inner_html(&rule.new_content);

    let mut color_set = false;
    if let Some(color) = rule.color_override() {
        let old_color = element.text_color();
        match element.set_text_color(color) {
            Ok(()) => {
                color_set = true;
                log::debug!(
                    "Color for rule {}: {} -> {}",
                    rule.label(),
                    if old_color.is_empty() { "default" } else { &old_color },
                    color
                );
            }
            Err(e) => log::warn!("Color not applied for rule {}: {}", rule.label(), e),
        }
    }

    ApplyOutcome::Applied {
        content_changed: old_content != rule.new_content,
        color_set,
    }
}

/// Truncate for log output.
pub(crate) fn preview(text: &str) -> String {
    truncate(text, PREVIEW_CHARS)
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
