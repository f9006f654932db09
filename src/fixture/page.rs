//! Page abstraction used by the fixture mounter.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::state::{FixtureResult, MediaType, Viewport};
use crate::dom::ElementRef;

/// Page-level operations available to fixtures.
///
/// Document attributes and scroll/focus live in the page itself; viewport,
/// media emulation and mouse position go through the automation driver.
#[async_trait]
pub trait Page: Send + Sync {
    /// Set (or with `None`, remove) an attribute on the document element
    fn set_document_attribute(&self, name: &str, value: Option<&str>);

    /// Show or hide the padding around page content
    fn set_page_padding(&self, visible: bool);

    fn reset_scroll(&self);

    fn blur_active_element(&self);

    /// Replace the fixture container's content with `element`
    fn mount(&self, element: ElementRef) -> FixtureResult<()>;

    async fn set_viewport(&self, viewport: Viewport) -> FixtureResult<()>;

    async fn emulate_media(&self, media: MediaType) -> FixtureResult<()>;

    async fn reset_mouse(&self) -> FixtureResult<()>;

    /// Resolve once font resources have loaded
    async fn fonts_ready(&self);
}

/// Page kept entirely in memory; records every mutation it receives.
#[derive(Debug, Default)]
pub struct MemoryPage {
    inner: Mutex<MemoryPageState>,
}

#[derive(Debug, Default)]
struct MemoryPageState {
    attributes: BTreeMap<String, String>,
    page_padding: bool,
    viewport: Option<Viewport>,
    media: Option<MediaType>,
    scroll_resets: usize,
    blurs: usize,
    mouse_resets: usize,
    mounted: Option<String>,
    operations: Vec<String>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_attribute(&self, name: &str) -> Option<String> {
        self.inner.lock().attributes.get(name).cloned()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.inner.lock().viewport
    }

    pub fn media(&self) -> Option<MediaType> {
        self.inner.lock().media
    }

    pub fn page_padding(&self) -> bool {
        self.inner.lock().page_padding
    }

    pub fn mouse_resets(&self) -> usize {
        self.inner.lock().mouse_resets
    }

    pub fn scroll_resets(&self) -> usize {
        self.inner.lock().scroll_resets
    }

    /// Markup of the currently mounted element
    pub fn mounted_html(&self) -> Option<String> {
        self.inner.lock().mounted.clone()
    }

    /// Page-state mutations in the order received (scroll/blur excluded)
    pub fn operations(&self) -> Vec<String> {
        self.inner.lock().operations.clone()
    }

    pub fn clear_operations(&self) {
        self.inner.lock().operations.clear();
    }
}

#[async_trait]
impl Page for MemoryPage {
    fn set_document_attribute(&self, name: &str, value: Option<&str>) {
        let mut inner = self.inner.lock();
        match value {
            Some(value) => {
                inner.attributes.insert(name.to_string(), value.to_string());
            }
            None => {
                inner.attributes.remove(name);
            }
        }
        inner.operations.push(format!("attr:{}", name));
    }

    fn set_page_padding(&self, visible: bool) {
        let mut inner = self.inner.lock();
        inner.page_padding = visible;
        inner.operations.push("padding".to_string());
    }

    fn reset_scroll(&self) {
        self.inner.lock().scroll_resets += 1;
    }

    fn blur_active_element(&self) {
        self.inner.lock().blurs += 1;
    }

    fn mount(&self, element: ElementRef) -> FixtureResult<()> {
        self.inner.lock().mounted = Some(element.outer_html());
        Ok(())
    }

    async fn set_viewport(&self, viewport: Viewport) -> FixtureResult<()> {
        let mut inner = self.inner.lock();
        inner.viewport = Some(viewport);
        inner.operations.push("viewport".to_string());
        Ok(())
    }

    async fn emulate_media(&self, media: MediaType) -> FixtureResult<()> {
        let mut inner = self.inner.lock();
        inner.media = Some(media);
        inner.operations.push("media".to_string());
        Ok(())
    }

    async fn reset_mouse(&self) -> FixtureResult<()> {
        self.inner.lock().mouse_resets += 1;
        Ok(())
    }

    async fn fonts_ready(&self) {}
}
