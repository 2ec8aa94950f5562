//! JSON page fixtures, used to load recorded host pages into a [`Document`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DomError, Document, NodeId};

#[derive(thiserror::Error, Debug)]
pub enum FixtureError {
    #[error("invalid page fixture: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid page tree: {0}")]
    Tree(#[from] DomError),
}

/// A recorded page: its address and the children of the root element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageFixture {
    pub location: String,
    #[serde(default)]
    pub children: Vec<NodeFixture>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeFixture {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeFixture>,
}

impl Document {
    pub fn from_fixture(page: &PageFixture) -> Result<Self, FixtureError> {
        let mut doc = Document::new(&page.location);
        let root = doc.root();
        for child in &page.children {
            doc.build(root, child)?;
        }
        Ok(doc)
    }

    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let page: PageFixture = serde_json::from_str(json)?;
        Self::from_fixture(&page)
    }

    /// Builds `fixture` as the last child of `parent` and returns its id.
    pub fn build(&mut self, parent: NodeId, fixture: &NodeFixture) -> Result<NodeId, FixtureError> {
        let node = self.create_element(&fixture.tag);
        if let Some(id) = &fixture.id {
            self.set_attribute(node, "id", id);
        }
        if let Some(class) = &fixture.class {
            self.set_attribute(node, "class", class);
        }
        for (name, value) in &fixture.attrs {
            self.set_attribute(node, name, value);
        }
        if let Some(text) = &fixture.text {
            self.set_text(node, text);
        }
        for child in &fixture.children {
            self.build(node, child)?;
        }
        self.append_child(parent, node)?;
        Ok(node)
    }
}
