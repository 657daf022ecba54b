//! In-memory DOM and a recording host for unit tests.
//!
//! Selectors are matched as opaque keys: `insert("#x", el)` makes `#x`
//! resolve to `el`. That is enough to exercise ordering, frames and
//! throttling without a CSS engine.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dom::{DocumentContext, DomError, ElementHandle, FrameAccess, FrameInfo, ObserveOptions};
use crate::engine::{EngineHost, HostError};

#[derive(Debug, Default)]
struct ElementData {
    tag: String,
    id: String,
    class_name: String,
    html: String,
    color: String,
    parent: Option<MockElement>,
}

#[derive(Debug, Clone)]
pub struct MockElement(Rc<RefCell<ElementData>>);

impl MockElement {
    pub fn new(tag: &str, html: &str) -> Self {
        Self(Rc::new(RefCell::new(ElementData {
            tag: tag.to_string(),
            html: html.to_string(),
            ..Default::default()
        })))
    }

    pub fn with_id(self, id: &str) -> Self {
        self.0.borrow_mut().id = id.to_string();
        self
    }

    pub fn with_class(self, class_name: &str) -> Self {
        self.0.borrow_mut().class_name = class_name.to_string();
        self
    }

    pub fn with_parent(self, parent: &MockElement) -> Self {
        self.0.borrow_mut().parent = Some(parent.clone());
        self
    }
}

impl ElementHandle for MockElement {
    fn tag_name(&self) -> String {
        self.0.borrow().tag.clone()
    }

    fn id(&self) -> String {
        self.0.borrow().id.clone()
    }

    fn class_name(&self) -> String {
        self.0.borrow().class_name.clone()
    }

    fn text_content(&self) -> String {
        self.0.borrow().html.clone()
    }

    fn parent(&self) -> Option<Self> {
        self.0.borrow().parent.clone()
    }

    fn inner_html(&self) -> String {
        self.0.borrow().html.clone()
    }

    fn set_inner_html(&self, markup: &str) {
        self.0.borrow_mut().html = markup.to_string();
    }

    fn text_color(&self) -> String {
        self.0.borrow().color.clone()
    }

    fn set_text_color(&self, color: &str) -> Result<(), DomError> {
        self.0.borrow_mut().color = color.to_string();
        Ok(())
    }
}

#[derive(Debug)]
struct DocumentData {
    elements: Vec<(String, MockElement)>,
    rejected: Vec<String>,
    frames: Vec<FrameAccess<MockDocument>>,
    has_body: bool,
}

#[derive(Debug, Clone)]
pub struct MockDocument(Rc<RefCell<DocumentData>>);

impl MockDocument {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(DocumentData {
            elements: Vec::new(),
            rejected: Vec::new(),
            frames: Vec::new(),
            has_body: true,
        })))
    }

    pub fn insert(&self, selector: &str, element: MockElement) {
        self.0.borrow_mut().elements.push((selector.to_string(), element));
    }

    /// Make `selector` a syntax error in this document only.
    pub fn reject_selector(&self, selector: &str) {
        self.0.borrow_mut().rejected.push(selector.to_string());
    }

    pub fn add_frame(&self, document: MockDocument) {
        let index = self.0.borrow().frames.len();
        self.0.borrow_mut().frames.push(FrameAccess::Accessible {
            document,
            info: FrameInfo {
                src: format!("about:blank#{}", index),
                ..Default::default()
            },
        });
    }

    pub fn add_blocked_frame(&self, src: &str) {
        self.0.borrow_mut().frames.push(FrameAccess::Inaccessible {
            info: FrameInfo {
                src: src.to_string(),
                ..Default::default()
            },
            reason: "cross-origin".to_string(),
        });
    }

    pub fn without_body(self) -> Self {
        self.0.borrow_mut().has_body = false;
        self
    }

    pub fn same_document(&self, other: &MockDocument) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl DocumentContext for MockDocument {
    type Element = MockElement;

    fn query_selector(&self, selector: &str) -> Result<Option<MockElement>, DomError> {
        let data = self.0.borrow();
        if data.rejected.iter().any(|s| s == selector) {
            return Err(DomError::InvalidSelector {
                selector: selector.to_string(),
                message: "not a valid selector".to_string(),
            });
        }
        Ok(data
            .elements
            .iter()
            .find(|(key, _)| key == selector)
            .map(|(_, element)| element.clone()))
    }

    fn count_matches(&self, selector: &str) -> Result<usize, DomError> {
        Ok(self.0.borrow().elements.iter().filter(|(key, _)| key == selector).count())
    }

    fn iframes(&self) -> Vec<FrameAccess<MockDocument>> {
        self.0.borrow().frames.clone()
    }

    fn has_body(&self) -> bool {
        self.0.borrow().has_body
    }
}

/// Host that records lifecycle calls instead of touching a browser.
pub struct MockHost {
    pub document: MockDocument,
    pub now: u64,
    pub loaded: bool,
    pub load_requests: usize,
    /// Number of bodies observed, while an observer is attached
    pub observed: Option<usize>,
    pub observer_attaches: usize,
    /// Period of the running timer
    pub timer: Option<u32>,
    pub fail_observer: bool,
}

impl MockHost {
    pub fn new(document: MockDocument) -> Self {
        Self {
            document,
            now: 0,
            loaded: false,
            load_requests: 0,
            observed: None,
            observer_attaches: 0,
            timer: None,
            fail_observer: false,
        }
    }
}

impl EngineHost for MockHost {
    type Document = MockDocument;

    fn document(&self) -> MockDocument {
        self.document.clone()
    }

    fn now_ms(&self) -> u64 {
        self.now
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn request_load_signal(&mut self) {
        self.load_requests += 1;
    }

    fn attach_observer(&mut self, targets: &[MockDocument], options: ObserveOptions) -> Result<(), HostError> {
        if self.fail_observer {
            return Err(HostError::Observer("observer refused".to_string()));
        }
        assert_eq!(options, ObserveOptions::CONTENT);
        self.observed = Some(targets.len());
        self.observer_attaches += 1;
        Ok(())
    }

    fn detach_observer(&mut self) {
        self.observed = None;
    }

    fn start_timer(&mut self, period_ms: u32) -> Result<(), HostError> {
        self.timer = Some(period_ms);
        Ok(())
    }

    fn cancel_timer(&mut self) {
        self.timer = None;
    }
}
