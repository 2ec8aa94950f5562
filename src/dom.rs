//! In-memory model of the host page's document tree.
//!
//! The engine never talks to a browser directly. It reads and writes a
//! [`Document`], and observes it through the [`MutationRecord`] stream the
//! document publishes on every effective change.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

mod fixture;
mod selector;

pub use fixture::{FixtureError, NodeFixture, PageFixture};
pub use selector::{Selector, SelectorError};

/// Capacity of the mutation broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// Handle to an element owned by a [`Document`].
///
/// Ids are only meaningful for the document that minted them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A single observed change, delivered after the document was mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// An attribute (or the inline style, reported as `style`) changed.
    Attributes { target: NodeId, name: String },
    /// Children were inserted into or removed from `target`.
    ChildList { target: NodeId },
    /// The element's own text changed.
    CharacterData { target: NodeId },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::Attributes { target, .. }
            | MutationRecord::ChildList { target }
            | MutationRecord::CharacterData { target } => *target,
        }
    }

    /// Returns the attribute name for attribute records.
    pub fn attribute_name(&self) -> Option<&str> {
        match self {
            MutationRecord::Attributes { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("node {node:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, node: NodeId },
    #[error("cannot insert {node:?} into its own subtree")]
    Cycle { node: NodeId },
    #[error("node {0:?} has no parent")]
    Orphan(NodeId),
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            style: BTreeMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Arena-backed element tree with a navigable address.
///
/// Removed elements stay in the arena but are detached from the root, so
/// stale [`NodeId`]s stay valid to query and report `false` from
/// [`Document::is_attached`].
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Element>,
    root: NodeId,
    location: String,
    events: broadcast::Sender<MutationRecord>,
}

impl Document {
    pub fn new(location: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            nodes: vec![Element::new("html")],
            root: NodeId(0),
            location: location.to_string(),
            events,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MutationRecord> {
        self.events.subscribe()
    }

    fn publish(&self, record: MutationRecord) {
        // No receivers is not an error: nobody is observing yet.
        let _ = self.events.send(record);
    }

    fn node(&self, id: NodeId) -> &Element {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Element {
        &mut self.nodes[id.0]
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Changes the navigable address. Like a single-page app's history
    /// push, this alone is not observable; the page re-render that follows is.
    pub fn set_location(&mut self, location: &str) {
        self.location = location.to_string();
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Element::new(tag));
        NodeId(self.nodes.len() - 1)
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.node(node).tag
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    /// Whether `node` is `ancestor` or lies in its subtree.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(self.root, node)
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.node(node).parent {
            self.node_mut(parent).children.retain(|c| *c != node);
            self.node_mut(node).parent = None;
            self.publish(MutationRecord::ChildList { target: parent });
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.contains(child, parent) {
            return Err(DomError::Cycle { node: child });
        }
        self.detach(child);
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
        self.publish(MutationRecord::ChildList { target: parent });
        Ok(())
    }

    /// Inserts `node` into `reference`'s parent, directly before `reference`.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> Result<(), DomError> {
        let parent = self.parent(reference).ok_or(DomError::Orphan(reference))?;
        if self.contains(node, parent) {
            return Err(DomError::Cycle { node });
        }
        self.detach(node);
        let position = self
            .children(parent)
            .iter()
            .position(|c| *c == reference)
            .ok_or(DomError::NotAChild { parent, node: reference })?;
        self.node_mut(parent).children.insert(position, node);
        self.node_mut(node).parent = Some(parent);
        self.publish(MutationRecord::ChildList { target: parent });
        Ok(())
    }

    /// Detaches `node` (and its subtree) from the tree.
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node).attrs.get(name).map(String::as_str)
    }

    /// Sets an attribute, publishing a record only when the value changed.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> bool {
        let attrs = &mut self.node_mut(node).attrs;
        if attrs.get(name).is_some_and(|v| v == value) {
            return false;
        }
        attrs.insert(name.to_string(), value.to_string());
        self.publish(MutationRecord::Attributes {
            target: node,
            name: name.to_string(),
        });
        true
    }

    pub fn classes(&self, node: NodeId) -> impl Iterator<Item = &str> {
        self.attribute(node, "class")
            .unwrap_or("")
            .split_whitespace()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).any(|c| c == class)
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) -> bool {
        if self.has_class(node, class) {
            return false;
        }
        let mut classes: Vec<&str> = self.classes(node).collect();
        classes.push(class);
        let value = classes.join(" ");
        self.set_attribute(node, "class", &value)
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) -> bool {
        if !self.has_class(node, class) {
            return false;
        }
        let value = self
            .classes(node)
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(node, "class", &value)
    }

    /// The element's own text, excluding descendants.
    pub fn own_text(&self, node: NodeId) -> &str {
        &self.node(node).text
    }

    /// Replaces the element's own text, leaving children in place.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> bool {
        if self.node(node).text == text {
            return false;
        }
        self.node_mut(node).text = text.to_string();
        self.publish(MutationRecord::CharacterData { target: node });
        true
    }

    /// Concatenated text of the element and its descendants, in document order.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        out.push_str(&self.node(node).text);
        for child in self.children(node) {
            self.collect_text(*child, out);
        }
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<&str> {
        self.node(node).style.get(property).map(String::as_str)
    }

    /// Sets an inline style property; reported as a `style` attribute change.
    pub fn set_style(&mut self, node: NodeId, property: &str, value: &str) -> bool {
        let style = &mut self.node_mut(node).style;
        if style.get(property).is_some_and(|v| v == value) {
            return false;
        }
        style.insert(property.to_string(), value.to_string());
        self.publish(MutationRecord::Attributes {
            target: node,
            name: "style".to_string(),
        });
        true
    }

    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        let element = self.node(node);
        if selector.tag().is_some_and(|t| !t.eq_ignore_ascii_case(&element.tag)) {
            return false;
        }
        if let Some(id) = selector.id() {
            if element.attrs.get("id").map(String::as_str) != Some(id) {
                return false;
            }
        }
        if !selector.classes().iter().all(|c| self.has_class(node, c)) {
            return false;
        }
        selector.attributes().iter().all(|(name, value)| {
            match (element.attrs.get(name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }

    /// All descendants of `scope` (excluding `scope`) matching `selector`,
    /// in document order.
    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.matches(node, selector) {
                found.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        found
    }

    /// First descendant of `scope` matching `selector`, in document order.
    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.matches(node, selector) {
                return Some(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        None
    }
}

/// A document shared between the host (which mutates it) and the engine.
#[derive(Debug, Clone)]
pub struct SharedDocument(Arc<Mutex<Document>>);

impl SharedDocument {
    pub fn new(document: Document) -> Self {
        Self(Arc::new(Mutex::new(document)))
    }

    /// Locks the document. A poisoned lock is recovered rather than
    /// propagated: the tree itself is never left half-updated by a panic
    /// in engine code, which only panics outside of mutations.
    pub fn lock(&self) -> MutexGuard<'_, Document> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MutationRecord> {
        self.lock().subscribe()
    }
}
