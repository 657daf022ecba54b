//! Document abstraction
//!
//! The engine never touches browser types directly. A host provides document
//! and element handles through these traits; handles are cheap clones of a
//! live node and mutate through a shared reference, the same way DOM
//! wrappers behave.

/// Error type for DOM access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
    #[error("Failed to set style: {0}")]
    Style(String),
}

bitflags::bitflags! {
    /// Mutation observer options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObserveOptions: u8 {
        /// Additions and removals of child nodes
        const CHILD_LIST = 1 << 0;
        /// Watch the whole subtree, not just the target
        const SUBTREE = 1 << 1;
        /// Text node content changes
        const CHARACTER_DATA = 1 << 2;

        /// Options used on every observed body
        const CONTENT = Self::CHILD_LIST.bits() | Self::SUBTREE.bits() | Self::CHARACTER_DATA.bits();
    }
}

/// Identifying attributes of an iframe element, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameInfo {
    pub src: String,
    pub id: String,
    pub name: String,
}

/// An iframe found in the top document.
#[derive(Debug, Clone)]
pub enum FrameAccess<D> {
    /// Same-origin frame with a readable content document
    Accessible { document: D, info: FrameInfo },
    /// Frame whose document cannot be read (cross-origin or not yet created)
    Inaccessible { info: FrameInfo, reason: String },
}

/// A live element.
pub trait ElementHandle: Clone {
    fn tag_name(&self) -> String;
    fn id(&self) -> String;
    fn class_name(&self) -> String;
    fn text_content(&self) -> String;
    fn parent(&self) -> Option<Self>;

    fn inner_html(&self) -> String;
    /// Replace the element's content with raw markup.
    fn set_inner_html(&self, markup: &str);

    /// Inline `color` style, empty when unset.
    fn text_color(&self) -> String;
    fn set_text_color(&self, color: &str) -> Result<(), DomError>;
}

/// A document context: the top document or one frame's document.
pub trait DocumentContext: Clone {
    type Element: ElementHandle;

    /// First element matching `selector`, in document order.
    fn query_selector(&self, selector: &str) -> Result<Option<Self::Element>, DomError>;

    /// Number of elements matching `selector`.
    fn count_matches(&self, selector: &str) -> Result<usize, DomError>;

    /// Every `iframe` in this document, in document order.
    fn iframes(&self) -> Vec<FrameAccess<Self>>;

    /// Whether the document has a body to observe.
    fn has_body(&self) -> bool;
}
