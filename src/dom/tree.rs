//! Depth-first traversal of the composed tree.

use std::collections::HashSet;
use std::sync::Arc;

use super::types::ElementRef;

/// Children of `node` in the composed tree.
///
/// A slot contributes its assigned nodes; any other element contributes its
/// shadow children followed by its light children.
pub fn composed_children(node: &ElementRef) -> Vec<ElementRef> {
    if node.is_slot() {
        return node.assigned_nodes();
    }
    let mut children = node
        .shadow_root()
        .map(|shadow| shadow.children)
        .unwrap_or_default();
    children.extend(node.children());
    children
}

fn identity(node: &ElementRef) -> usize {
    Arc::as_ptr(node) as *const () as usize
}

/// Pre-order iterator over a composed tree.
///
/// Each element is yielded once even when it is reachable both as a light
/// child and through a slot.
pub struct ComposedTree {
    stack: Vec<ElementRef>,
    seen: HashSet<usize>,
}

impl ComposedTree {
    /// Iterate the descendants of `root`, excluding `root` itself
    pub fn descendants(root: &ElementRef) -> Self {
        let mut tree = Self {
            stack: Vec::new(),
            seen: HashSet::new(),
        };
        tree.seen.insert(identity(root));
        tree.push_children(root);
        tree
    }

    /// Iterate `root` followed by its descendants
    pub fn including_root(root: &ElementRef) -> Self {
        Self {
            stack: vec![root.clone()],
            seen: HashSet::new(),
        }
    }

    fn push_children(&mut self, node: &ElementRef) {
        let children = composed_children(node);
        self.stack.extend(children.into_iter().rev());
    }
}

impl Iterator for ComposedTree {
    type Item = ElementRef;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            if !self.seen.insert(identity(&node)) {
                continue;
            }
            self.push_children(&node);
            return Some(node);
        }
        None
    }
}
