//! Diagnostic summaries for selector hits and misses.

use std::fmt;

use crate::applier::truncate;
use crate::dom::{DocumentContext, ElementHandle};
use crate::frames::FrameLocator;

const TEXT_PREVIEW_CHARS: usize = 50;

/// Summary of a resolved element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDetails {
    pub tag_name: String,
    pub id: String,
    pub class_name: String,
    pub text_preview: String,
    /// e.g. `html > body > div#main > h1.title`
    pub path: String,
}

impl ElementDetails {
    pub fn of<E: ElementHandle>(element: &E) -> Self {
        Self {
            tag_name: element.tag_name(),
            id: element.id(),
            class_name: element.class_name(),
            text_preview: truncate(&element.text_content(), TEXT_PREVIEW_CHARS),
            path: element_path(element),
        }
    }
}

/// Path from the root element, each step as `tag`, `tag#id` or `tag.c1.c2`.
pub fn element_path<E: ElementHandle>(element: &E) -> String {
    let mut steps = Vec::new();
    let mut current = Some(element.clone());
    while let Some(node) = current {
        let mut step = node.tag_name().to_lowercase();
        let id = node.id();
        let class_name = node.class_name();
        if !id.is_empty() {
            step.push('#');
            step.push_str(&id);
        } else if !class_name.trim().is_empty() {
            for class in class_name.split_whitespace() {
                step.push('.');
                step.push_str(class);
            }
        }
        steps.push(step);
        current = node.parent();
    }
    steps.reverse();
    steps.join(" > ")
}

/// A plausible cause for a selector that matched nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissHint {
    /// Descendant combinator in the selector
    ContainsSpace,
    /// An id selector matched more than one element
    DuplicateId,
    /// A class selector matched no element at all
    NoSuchClass,
    /// The target may live in a frame that cannot be inspected
    MayBeInFrame,
}

impl fmt::Display for MissHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ContainsSpace => "selector contains a space, check the combinator",
            Self::DuplicateId => "id selector matches several elements",
            Self::NoSuchClass => "no element carries this class",
            Self::MayBeInFrame => "page has iframes, the target may be in a cross-origin frame",
        };
        f.write_str(text)
    }
}

/// Diagnostics for a selector that resolved to nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissReport {
    pub selector: String,
    pub searched_frames: usize,
    pub hints: Vec<MissHint>,
}

impl MissReport {
    pub fn build<D: DocumentContext>(top: &D, selector: &str) -> Self {
        let locator = FrameLocator::new(top);
        let mut hints = Vec::new();

        if selector.contains(' ') {
            hints.push(MissHint::ContainsSpace);
        }
        if selector.contains('#') && top.count_matches(selector).unwrap_or(0) > 1 {
            hints.push(MissHint::DuplicateId);
        }
        if let Some(class) = selector.strip_prefix('.') {
            let class_selector = format!(".{}", class);
            if top.count_matches(&class_selector).unwrap_or(0) == 0 {
                hints.push(MissHint::NoSuchClass);
            }
        }
        if locator.iframe_count() > 0 {
            hints.push(MissHint::MayBeInFrame);
        }

        Self {
            selector: selector.to_string(),
            searched_frames: locator.list_frames().len(),
            hints,
        }
    }
}

impl fmt::Display for MissReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' not found in {} frame(s)", self.selector, self.searched_frames)?;
        for hint in &self.hints {
            write!(f, "; {}", hint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDocument, MockElement};

    #[test]
    fn test_element_path() {
        let html = MockElement::new("HTML", "");
        let body = MockElement::new("BODY", "").with_parent(&html);
        let main = MockElement::new("DIV", "").with_id("main").with_parent(&body);
        let title = MockElement::new("H1", "Hello").with_class("title big").with_parent(&main);

        assert_eq!(element_path(&title), "html > body > div#main > h1.title.big");

        let details = ElementDetails::of(&title);
        assert_eq!(details.tag_name, "H1");
        assert_eq!(details.class_name, "title big");
        assert_eq!(details.text_preview, "Hello");
    }

    #[test]
    fn test_miss_hints() {
        let top = MockDocument::new();
        top.add_blocked_frame("https://other.example/");

        let report = MissReport::build(&top, ".banner");
        assert_eq!(report.searched_frames, 1);
        assert_eq!(report.hints, vec![MissHint::NoSuchClass, MissHint::MayBeInFrame]);

        let report = MissReport::build(&top, "div p");
        assert!(report.hints.contains(&MissHint::ContainsSpace));
        assert!(report.to_string().starts_with("'div p' not found in 1 frame(s)"));
    }

    #[test]
    fn test_duplicate_id_hint() {
        let top = MockDocument::new();
        top.insert("#dup", MockElement::new("span", "a"));
        top.insert("#dup", MockElement::new("span", "b"));

        let report = MissReport::build(&top, "#dup");
        assert_eq!(report.hints, vec![MissHint::DuplicateId]);
    }
}
