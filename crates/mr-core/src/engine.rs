//! Rule Engine
//!
//! Decides which rules fire on which trigger and owns the observer/timer
//! lifecycle for one page context.
//!
//! # States
//!
//! - `Idle`: no observer, no timer. Initial state, and the resting state when
//!   the page has no active `loop` rule.
//! - `Observing`: a mutation observer watches the top body and every
//!   accessible iframe body. Each batch re-runs every matching `loop` rule
//!   through the throttled path.
//! - `ObservingAndForcing`: additionally a fixed-period timer re-applies every
//!   matching `loop` rule through the forced path, which skips the throttle.
//!
//! The host delivers every trigger (start, message, mutation batch, timer
//! tick, load) as a separate call on one thread; calls never overlap.

use crate::applier::{apply_forced, ApplyOutcome, ContentApplier, SkipReason};
use crate::diagnostics::{ElementDetails, MissReport};
use crate::dom::{DocumentContext, ObserveOptions};
use crate::frames::FrameLocator;
use crate::message::EngineMessage;
use crate::rule::{Rule, TriggerTiming};
use crate::ruleset::{RuleSet, StoredSettings};
use crate::throttle::{ThrottleConfig, ThrottleRegistry};

/// Period of the forced re-apply timer.
pub const FORCE_LOOP_INTERVAL_MS: u32 = 250;

/// Error type for host lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("Failed to attach mutation observer: {0}")]
    Observer(String),
    #[error("Failed to start timer: {0}")]
    Timer(String),
}

/// Everything the engine needs from the page it runs in.
pub trait EngineHost {
    type Document: DocumentContext;

    /// The top-level document.
    fn document(&self) -> Self::Document;

    /// Current time in milliseconds.
    fn now_ms(&self) -> u64;

    /// Whether the page's load event has already fired.
    fn is_loaded(&self) -> bool;

    /// Arrange for [`RuleEngine::on_load`] to be called once the page has
    /// loaded. Repeated requests must not produce repeated signals.
    fn request_load_signal(&mut self);

    /// Observe each document body; batches go to [`RuleEngine::on_mutation`].
    fn attach_observer(&mut self, targets: &[Self::Document], options: ObserveOptions) -> Result<(), HostError>;

    fn detach_observer(&mut self);

    /// Call [`RuleEngine::on_tick`] every `period_ms`.
    fn start_timer(&mut self, period_ms: u32) -> Result<(), HostError>;

    fn cancel_timer(&mut self);
}

/// Engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub throttle: ThrottleConfig,
    pub force_loop_interval_ms: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            throttle: ThrottleConfig::default(),
            force_loop_interval_ms: FORCE_LOOP_INTERVAL_MS,
        }
    }
}

/// Observer/timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Observing,
    ObservingAndForcing,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Observing => "observing",
            Self::ObservingAndForcing => "observing+forcing",
        }
    }
}

/// What happened to one rule in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Throttled path wrote the element
    Applied { frame_index: usize },
    /// Forced path wrote the element
    Forced { frame_index: usize },
    /// Element found but nothing written
    Skipped(SkipReason),
    NotFound,
    Disabled,
    /// Missing selector or content
    Malformed,
    /// Waiting for the load event
    Deferred,
}

/// Outcome of one rule within a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub outcome: DispatchOutcome,
}

/// Rule engine for one page context.
pub struct RuleEngine {
    page_url: String,
    config: EngineConfig,
    rules: RuleSet,
    throttle: ThrottleRegistry,
    force_loop_enabled: bool,
    state: EngineState,
    pending_onload: Vec<String>,
}

impl RuleEngine {
    /// Create an idle engine for `page_url`, started at `started_at` ms.
    pub fn new(page_url: impl Into<String>, started_at: u64) -> Self {
        Self::with_config(page_url, started_at, EngineConfig::default())
    }

    pub fn with_config(page_url: impl Into<String>, started_at: u64, config: EngineConfig) -> Self {
        Self {
            page_url: page_url.into(),
            config,
            rules: RuleSet::new(),
            throttle: ThrottleRegistry::with_config(started_at, config.throttle),
            force_loop_enabled: false,
            state: EngineState::Idle,
            pending_onload: Vec::new(),
        }
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn force_loop_enabled(&self) -> bool {
        self.force_loop_enabled
    }

    pub fn throttle(&self) -> &ThrottleRegistry {
        &self.throttle
    }

    pub fn pending_onload(&self) -> &[String] {
        &self.pending_onload
    }

    /// Seed from the stored settings and run the initial pass.
    pub fn start<H: EngineHost>(&mut self, host: &mut H, settings: StoredSettings) -> Vec<RuleOutcome> {
        self.force_loop_enabled = settings.force_loop_enabled;
        self.rules = settings.rules;
        log::info!(
            "Loaded {} rule(s), {} for this page, force loop {}",
            self.rules.len(),
            self.rules.for_url(&self.page_url).count(),
            if self.force_loop_enabled { "on" } else { "off" }
        );
        self.initial_pass(host)
    }

    /// Apply a message from the popup or rule manager.
    pub fn handle_message<H: EngineHost>(&mut self, host: &mut H, message: EngineMessage) -> Vec<RuleOutcome> {
        match message {
            EngineMessage::UpdateSettings { settings } => {
                log::info!("Received rule {} ({})", settings.id, settings.label());
                let was_observing = self.state != EngineState::Idle;
                self.rules.upsert(settings.clone());

                if !was_observing {
                    return self.initial_pass(host);
                }

                self.reconcile(host);
                if !settings.applies_to(&self.page_url) {
                    return Vec::new();
                }
                let document = host.document();
                let outcome = dispatch(&mut self.throttle, &document, &settings, host.now_ms());
                vec![RuleOutcome { rule_id: settings.id, outcome }]
            }
            EngineMessage::UpdateForceLoop { enabled } => {
                log::info!("Force loop {}", if enabled { "enabled" } else { "disabled" });
                self.force_loop_enabled = enabled;
                self.reconcile(host);
                Vec::new()
            }
        }
    }

    /// A mutation batch was observed: re-run every matching `loop` rule
    /// through the throttled path.
    pub fn on_mutation<H: EngineHost>(&mut self, host: &mut H, record_count: usize) -> Vec<RuleOutcome> {
        if self.state == EngineState::Idle {
            log::debug!("Ignoring mutation batch while idle");
            return Vec::new();
        }
        log::debug!("Mutation batch of {} record(s)", record_count);

        let document = host.document();
        let now = host.now_ms();
        let mut outcomes = Vec::new();
        for rule in self.rules.for_url(&self.page_url).filter(|r| r.is_loop()) {
            let outcome = dispatch(&mut self.throttle, &document, rule, now);
            outcomes.push(RuleOutcome { rule_id: rule.id.clone(), outcome });
        }
        outcomes
    }

    /// Forced timer tick: re-apply every matching `loop` rule without
    /// consulting or updating the throttle.
    pub fn on_tick<H: EngineHost>(&mut self, host: &mut H) -> Vec<RuleOutcome> {
        if self.state != EngineState::ObservingAndForcing {
            log::debug!("Ignoring timer tick in state {}", self.state.as_str());
            return Vec::new();
        }

        let document = host.document();
        self.rules
            .for_url(&self.page_url)
            .filter(|r| r.is_loop())
            .map(|rule| RuleOutcome {
                rule_id: rule.id.clone(),
                outcome: force(&document, rule),
            })
            .collect()
    }

    /// The page finished loading: fire the deferred `onload` rules.
    pub fn on_load<H: EngineHost>(&mut self, host: &mut H) -> Vec<RuleOutcome> {
        let pending = std::mem::take(&mut self.pending_onload);
        if pending.is_empty() {
            return Vec::new();
        }
        log::info!("Page loaded, firing {} deferred rule(s)", pending.len());

        let document = host.document();
        let now = host.now_ms();
        let mut outcomes = Vec::new();
        for id in pending {
            let rule = match self.rules.get(&id) {
                Some(rule) if rule.applies_to(&self.page_url) => rule,
                _ => continue,
            };
            let outcome = dispatch(&mut self.throttle, &document, rule, now);
            outcomes.push(RuleOutcome { rule_id: id, outcome });
        }
        outcomes
    }

    /// Detach the observer, cancel the timer and drop deferred rules.
    pub fn shutdown<H: EngineHost>(&mut self, host: &mut H) {
        self.stop(host);
        self.pending_onload.clear();
    }

    fn initial_pass<H: EngineHost>(&mut self, host: &mut H) -> Vec<RuleOutcome> {
        let document = host.document();
        let now = host.now_ms();
        let loaded = host.is_loaded();
        let mut outcomes = Vec::new();
        let mut needs_load_signal = false;

        for rule in self.rules.for_url(&self.page_url) {
            let outcome = match rule.trigger_timing {
                TriggerTiming::Immediate => dispatch(&mut self.throttle, &document, rule, now),
                TriggerTiming::Onload if loaded => dispatch(&mut self.throttle, &document, rule, now),
                TriggerTiming::Onload => {
                    if !self.pending_onload.contains(&rule.id) {
                        self.pending_onload.push(rule.id.clone());
                    }
                    needs_load_signal = true;
                    DispatchOutcome::Deferred
                }
            };
            outcomes.push(RuleOutcome { rule_id: rule.id.clone(), outcome });
        }

        if outcomes.is_empty() {
            log::info!("No rules for {}", self.page_url);
        }
        if needs_load_signal {
            host.request_load_signal();
        }

        self.reconcile(host);
        outcomes
    }

    fn has_active_loop_rules(&self) -> bool {
        self.rules
            .for_url(&self.page_url)
            .any(|r| r.is_loop() && !r.disabled)
    }

    /// Move to the state the current rules and toggle call for.
    fn reconcile<H: EngineHost>(&mut self, host: &mut H) {
        let want_observe = self.has_active_loop_rules();
        let want_force = want_observe && self.force_loop_enabled;

        if !want_observe {
            self.stop(host);
            return;
        }

        if self.state == EngineState::Idle {
            let document = host.document();
            let targets: Vec<_> = FrameLocator::new(&document)
                .list_frames()
                .into_iter()
                .filter(|frame| frame.has_body())
                .collect();
            match host.attach_observer(&targets, ObserveOptions::CONTENT) {
                Ok(()) => {
                    log::info!("Observer attached to {} document(s)", targets.len());
                    self.state = EngineState::Observing;
                }
                Err(e) => {
                    log::error!("{}", e);
                    return;
                }
            }
        }

        match (self.state, want_force) {
            (EngineState::Observing, true) => match host.start_timer(self.config.force_loop_interval_ms) {
                Ok(()) => {
                    log::info!("Force loop timer started ({}ms)", self.config.force_loop_interval_ms);
                    self.state = EngineState::ObservingAndForcing;
                }
                Err(e) => log::error!("{}", e),
            },
            (EngineState::ObservingAndForcing, false) => {
                host.cancel_timer();
                log::info!("Force loop timer stopped");
                self.state = EngineState::Observing;
            }
            _ => {}
        }
    }

    fn stop<H: EngineHost>(&mut self, host: &mut H) {
        if self.state == EngineState::ObservingAndForcing {
            host.cancel_timer();
        }
        if self.state != EngineState::Idle {
            host.detach_observer();
            log::info!("Observer and force loop stopped");
        }
        self.state = EngineState::Idle;
    }
}

/// Checks shared by the throttled and forced paths, malformed first.
fn precheck(rule: &Rule) -> Option<DispatchOutcome> {
    if rule.selector.trim().is_empty() || rule.new_content.is_empty() {
        log::warn!("Rule {} is missing a selector or content", rule.label());
        return Some(DispatchOutcome::Malformed);
    }
    if rule.disabled {
        log::debug!("Rule {} is disabled", rule.label());
        return Some(DispatchOutcome::Disabled);
    }
    None
}

/// Throttled dispatch of one rule: validate, resolve, apply.
fn dispatch<D: DocumentContext>(
    throttle: &mut ThrottleRegistry,
    document: &D,
    rule: &Rule,
    now: u64,
) -> DispatchOutcome {
    if let Some(outcome) = precheck(rule) {
        return outcome;
    }

    let located = match FrameLocator::new(document).resolve(&rule.selector) {
        Some(located) => located,
        None => {
            log::warn!("Rule {}: {}", rule.label(), MissReport::build(document, &rule.selector));
            return DispatchOutcome::NotFound;
        }
    };

    if log::log_enabled!(log::Level::Debug) {
        let details = ElementDetails::of(&located.element);
        log::debug!(
            "Rule {} matched <{}> at {} in frame {}",
            rule.label(),
            details.tag_name,
            details.path,
            located.frame_index
        );
    }

    match ContentApplier::new(throttle).apply(Some(&located.element), rule, now) {
        ApplyOutcome::Applied { .. } => DispatchOutcome::Applied {
            frame_index: located.frame_index,
        },
        ApplyOutcome::Skipped(reason) => DispatchOutcome::Skipped(reason),
    }
}

/// Forced dispatch: resolve and write, bypassing the throttle entirely.
fn force<D: DocumentContext>(document: &D, rule: &Rule) -> DispatchOutcome {
    if let Some(outcome) = precheck(rule) {
        return outcome;
    }
    let located = match FrameLocator::new(document).resolve(&rule.selector) {
        Some(located) => located,
        None => return DispatchOutcome::NotFound,
    };
    match apply_forced(&located.element, rule) {
        ApplyOutcome::Applied { content_changed, .. } => {
            log::debug!(
                "Forced rule {} in frame {} (changed: {})",
                rule.label(),
                located.frame_index,
                content_changed
            );
            DispatchOutcome::Forced {
                frame_index: located.frame_index,
            }
        }
        ApplyOutcome::Skipped(reason) => DispatchOutcome::Skipped(reason),
    }
}
