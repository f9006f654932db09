//! In-memory element implementation.
//!
//! `MemoryElement` is a minimal composed-tree node: attributes, text, light
//! children, an optional shadow root and slot assignments. Render and loading
//! signals can be scripted, which makes it usable as a stand-in component for
//! fixtures and for exercising the settle algorithm.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::watch;

use super::types::{Element, ElementRef, Loadable, Rect, ShadowRoot, Updatable};

#[derive(Default)]
struct NodeState {
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<ElementRef>,
    shadow: Option<Vec<ElementRef>>,
    assigned: Vec<ElementRef>,
    rect: Rect,
}

/// Scripted in-memory element
pub struct MemoryElement {
    tag: String,
    state: Mutex<NodeState>,
    updatable: bool,
    updates: Mutex<VecDeque<bool>>,
    update_calls: AtomicUsize,
    restless: bool,
    renders: AtomicU64,
    loaded: Option<watch::Sender<bool>>,
    connected: AtomicBool,
}

impl MemoryElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            state: Mutex::new(NodeState::default()),
            updatable: false,
            updates: Mutex::new(VecDeque::new()),
            update_calls: AtomicUsize::new(0),
            restless: false,
            renders: AtomicU64::new(0),
            loaded: None,
            connected: AtomicBool::new(true),
        }
    }

    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.state.lock().attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.state.lock().text = text.into();
        self
    }

    pub fn with_child(self, child: ElementRef) -> Self {
        self.state.lock().children.push(child);
        self
    }

    pub fn with_shadow(self, children: Vec<ElementRef>) -> Self {
        self.state.lock().shadow = Some(children);
        self
    }

    /// Nodes assigned to this element (meaningful for `<slot>`)
    pub fn with_assigned(self, nodes: Vec<ElementRef>) -> Self {
        self.state.lock().assigned = nodes;
        self
    }

    pub fn with_rect(self, rect: Rect) -> Self {
        self.state.lock().rect = rect;
        self
    }

    /// Give the element a render cycle. Each `update_complete` call pops the
    /// next scripted value; once the script runs out it reports no pending work.
    pub fn with_updates(mut self, script: impl IntoIterator<Item = bool>) -> Self {
        self.updatable = true;
        self.updates.lock().extend(script);
        self
    }

    /// Make every serialization differ from the previous one
    pub fn restless(mut self) -> Self {
        self.restless = true;
        self
    }

    /// Give the element a loading phase that completes on [`MemoryElement::finish_loading`]
    pub fn with_loading(mut self) -> Self {
        self.loaded = Some(watch::Sender::new(false));
        self
    }

    pub fn into_ref(self) -> ElementRef {
        Arc::new(self)
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.state.lock().attributes.insert(name.into(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.state.lock().attributes.get(name).cloned()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.state.lock().text = text.into();
    }

    pub fn append_child(&self, child: ElementRef) {
        self.state.lock().children.push(child);
    }

    pub fn clear_children(&self) {
        self.state.lock().children.clear();
    }

    /// Queue more scripted render results
    pub fn queue_updates(&self, script: impl IntoIterator<Item = bool>) {
        self.updates.lock().extend(script);
    }

    /// Number of times `update_complete` has been awaited
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn finish_loading(&self) {
        if let Some(loaded) = &self.loaded {
            loaded.send_replace(true);
        }
    }

    /// Detach the element from the document
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Element for MemoryElement {
    fn tag_name(&self) -> String {
        self.tag.clone()
    }

    fn outer_html(&self) -> String {
        let state = self.state.lock();
        let mut html = format!("<{}", self.tag);
        for (name, value) in &state.attributes {
            html.push_str(&format!(" {}=\"{}\"", name, value));
        }
        if self.restless {
            let render = self.renders.fetch_add(1, Ordering::SeqCst);
            html.push_str(&format!(" data-render=\"{}\"", render));
        }
        html.push('>');
        html.push_str(&state.text);
        for child in &state.children {
            html.push_str(&child.outer_html());
        }
        html.push_str(&format!("</{}>", self.tag));
        html
    }

    fn shadow_root(&self) -> Option<ShadowRoot> {
        let state = self.state.lock();
        state.shadow.as_ref().map(|children| ShadowRoot {
            inner_html: children.iter().map(|c| c.outer_html()).collect(),
            children: children.clone(),
        })
    }

    fn children(&self) -> Vec<ElementRef> {
        self.state.lock().children.clone()
    }

    fn assigned_nodes(&self) -> Vec<ElementRef> {
        self.state.lock().assigned.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn bounding_rect(&self) -> Rect {
        self.state.lock().rect
    }

    fn updatable(&self) -> Option<&dyn Updatable> {
        if self.updatable { Some(self) } else { None }
    }

    fn loadable(&self) -> Option<&dyn Loadable> {
        if self.loaded.is_some() { Some(self) } else { None }
    }
}

#[async_trait]
impl Updatable for MemoryElement {
    async fn update_complete(&self) -> bool {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.updates.lock().pop_front().unwrap_or(false)
    }
}

#[async_trait]
impl Loadable for MemoryElement {
    async fn loading_complete(&self) {
        if let Some(loaded) = &self.loaded {
            let mut rx = loaded.subscribe();
            let _ = rx.wait_for(|done| *done).await;
        }
    }
}
