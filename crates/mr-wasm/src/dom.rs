//! web-sys implementations of the engine's document traits.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlElement, HtmlIFrameElement};

use mr_core::dom::{DocumentContext, DomError, ElementHandle, FrameAccess, FrameInfo};

/// Best-effort text of a thrown JS value.
pub(crate) fn js_message(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

#[derive(Clone)]
pub struct BrowserDocument(pub Document);

impl BrowserDocument {
    pub fn body(&self) -> Option<HtmlElement> {
        self.0.body()
    }
}

impl DocumentContext for BrowserDocument {
    type Element = BrowserElement;

    fn query_selector(&self, selector: &str) -> Result<Option<BrowserElement>, DomError> {
        self.0
            .query_selector(selector)
            .map(|found| found.map(BrowserElement))
            .map_err(|e| DomError::InvalidSelector {
                selector: selector.to_string(),
                message: js_message(&e),
            })
    }

    fn count_matches(&self, selector: &str) -> Result<usize, DomError> {
        self.0
            .query_selector_all(selector)
            .map(|list| list.length() as usize)
            .map_err(|e| DomError::InvalidSelector {
                selector: selector.to_string(),
                message: js_message(&e),
            })
    }

    fn iframes(&self) -> Vec<FrameAccess<BrowserDocument>> {
        let collection = self.0.get_elements_by_tag_name("iframe");
        let mut frames = Vec::with_capacity(collection.length() as usize);

        for index in 0..collection.length() {
            // `instanceof` fails for frames nested in another realm; the
            // collection only holds iframe elements.
            let iframe: HtmlIFrameElement = match collection.item(index) {
                Some(el) => el.unchecked_into(),
                None => continue,
            };
            let info = FrameInfo {
                src: iframe.src(),
                id: iframe.id(),
                name: iframe.name(),
            };
            // Cross-origin frames report a null content document.
            frames.push(match iframe.content_document() {
                Some(document) => FrameAccess::Accessible {
                    document: BrowserDocument(document),
                    info,
                },
                None => FrameAccess::Inaccessible {
                    info,
                    reason: "content document not accessible".to_string(),
                },
            });
        }

        frames
    }

    fn has_body(&self) -> bool {
        self.0.body().is_some()
    }
}

#[derive(Clone)]
pub struct BrowserElement(pub Element);

impl BrowserElement {
    /// The element as an `HTMLElement` if it carries an inline style.
    ///
    /// Elements found inside an iframe belong to that frame's realm and
    /// fail `instanceof` against this window's `HTMLElement`, so this
    /// checks for the `style` property instead.
    fn styled(&self) -> Option<&HtmlElement> {
        match js_sys::Reflect::has(&self.0, &JsValue::from_str("style")) {
            Ok(true) => Some(self.0.unchecked_ref::<HtmlElement>()),
            _ => None,
        }
    }
}

impl ElementHandle for BrowserElement {
    fn tag_name(&self) -> String {
        self.0.tag_name()
    }

    fn id(&self) -> String {
        self.0.id()
    }

    fn class_name(&self) -> String {
        self.0.class_name()
    }

    fn text_content(&self) -> String {
        self.0.text_content().unwrap_or_default()
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent_element().map(BrowserElement)
    }

    fn inner_html(&self) -> String {
        self.0.inner_html()
    }

    fn set_inner_html(&self, markup: &str) {
        self.0.set_inner_html(markup);
    }

    fn text_color(&self) -> String {
        self.styled()
            .and_then(|el| el.style().get_property_value("color").ok())
            .unwrap_or_default()
    }

    fn set_text_color(&self, color: &str) -> Result<(), DomError> {
        let element = self
            .styled()
            .ok_or_else(|| DomError::Style(format!("<{}> has no inline style", self.0.tag_name())))?;
        element
            .style()
            .set_property("color", color)
            .map_err(|e| DomError::Style(js_message(&e)))
    }
}
