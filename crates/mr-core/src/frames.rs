//! Frame enumeration and selector resolution across same-origin frames.

use crate::dom::{DocumentContext, FrameAccess};

/// An element found by [`FrameLocator::resolve`].
#[derive(Debug, Clone)]
pub struct Located<E> {
    pub element: E,
    /// Position in [`FrameLocator::list_frames`]; 0 is the top document
    pub frame_index: usize,
}

/// Resolves selectors against the top document and its accessible iframes,
/// nested ones included.
///
/// Nothing is cached: every call re-scans the live DOM.
pub struct FrameLocator<'a, D> {
    top: &'a D,
}

impl<'a, D: DocumentContext> FrameLocator<'a, D> {
    pub fn new(top: &'a D) -> Self {
        Self { top }
    }

    /// Top document first, then every accessible iframe document in
    /// document order, descending into nested frames depth first.
    /// Inaccessible frames are logged and skipped along with their subtree.
    pub fn list_frames(&self) -> Vec<D> {
        let mut frames = vec![self.top.clone()];
        collect_frames(self.top, &mut frames);
        frames
    }

    /// First match across [`list_frames`](Self::list_frames), in order.
    ///
    /// A selector error in one frame counts as no match for that frame.
    pub fn resolve(&self, selector: &str) -> Option<Located<D::Element>> {
        self.list_frames()
            .iter()
            .enumerate()
            .find_map(|(frame_index, frame)| match frame.query_selector(selector) {
                Ok(Some(element)) => Some(Located { element, frame_index }),
                Ok(None) => None,
                Err(e) => {
                    log::warn!("Lookup failed in frame {}: {}", frame_index, e);
                    None
                }
            })
    }

    /// Number of `iframe` elements in the top document, accessible or not.
    pub fn iframe_count(&self) -> usize {
        self.top.iframes().len()
    }
}

fn collect_frames<D: DocumentContext>(document: &D, frames: &mut Vec<D>) {
    for frame in document.iframes() {
        match frame {
            FrameAccess::Accessible { document: child, info } => {
                log::debug!("Frame accessible: src={} id={} name={}", info.src, info.id, info.name);
                frames.push(child.clone());
                collect_frames(&child, frames);
            }
            FrameAccess::Inaccessible { info, reason } => {
                log::debug!("Skipping inaccessible frame src={}: {}", info.src, reason);
            }
        }
    }
}
