// Core types for the browser-side composed tree

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Shared handle to an element in the composed tree
pub type ElementRef = Arc<dyn Element>;

/// Bounding box in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Contents of an element's shadow root at the time it was read
#[derive(Clone, Default)]
pub struct ShadowRoot {
    /// Serialized markup of the shadow root's children
    pub inner_html: String,
    /// Element children of the shadow root
    pub children: Vec<ElementRef>,
}

/// A node of the composed tree (light DOM, shadow DOM and slot assignments).
///
/// Optional behaviour is exposed through capability accessors rather than
/// probing: an element that has no render cycle returns `None` from
/// [`Element::updatable`], one without an async loading phase returns `None`
/// from [`Element::loadable`].
pub trait Element: Send + Sync {
    /// Lower-case tag name
    fn tag_name(&self) -> String;

    /// Serialized markup of the element including its light children
    fn outer_html(&self) -> String;

    fn shadow_root(&self) -> Option<ShadowRoot> {
        None
    }

    /// Light children
    fn children(&self) -> Vec<ElementRef> {
        Vec::new()
    }

    /// Nodes assigned to this element when it is a `<slot>`
    fn assigned_nodes(&self) -> Vec<ElementRef> {
        Vec::new()
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn bounding_rect(&self) -> Rect {
        Rect::default()
    }

    fn is_slot(&self) -> bool {
        self.tag_name().eq_ignore_ascii_case("slot")
    }

    fn updatable(&self) -> Option<&dyn Updatable> {
        None
    }

    fn loadable(&self) -> Option<&dyn Loadable> {
        None
    }
}

/// Elements with an asynchronous render cycle.
#[async_trait]
pub trait Updatable: Send + Sync {
    /// Resolves once the pending render has settled. Returns `true` when
    /// another update was already queued by the time it resolved.
    async fn update_complete(&self) -> bool;
}

/// Elements with an asynchronous loading phase (images, data fetches).
#[async_trait]
pub trait Loadable: Send + Sync {
    async fn loading_complete(&self);
}

/// Result type for settle operations
pub type SettleResult<T> = Result<T, SettleError>;

/// Error types for settle operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleError {
    /// The tree kept changing past the configured timeout
    Timeout(Duration),
}

impl std::fmt::Display for SettleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettleError::Timeout(d) => write!(f, "Element did not settle within {:?}", d),
        }
    }
}

impl std::error::Error for SettleError {}
