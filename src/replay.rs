//! Replays recorded host page behaviour against a [`SharedDocument`].
//!
//! The replay plays the part of the host page: it toggles the playing item,
//! flips the stylesheet and performs in-page navigations the way the live
//! page does, so the engine can be exercised without a browser.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tokio::time;
use tracing::debug;

use crate::config::SelectorSettings;
use crate::dom::{DomError, FixtureError, NodeFixture, Selector, SelectorError, SharedDocument};
use crate::extract::{self, PlaylistSelectors};

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error("failed to read replay script: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid replay script: {0}")]
    Json(#[from] serde_json::Error),
    #[error("page has no playlist")]
    NoPlaylist,
    #[error("playlist has {count} items, cannot activate item {index}")]
    NoItem { index: usize, count: usize },
    #[error("page has no theme source")]
    NoThemeSource,
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    #[error(transparent)]
    Dom(#[from] DomError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Let time pass so delayed refreshes can run.
    Wait { ms: u64 },
    /// Mark the zero-based item as playing.
    Activate { index: usize },
    /// Point the theme stylesheet at a new address.
    Theme { href: String },
    /// Change the address, optionally swapping in a new playlist.
    Navigate {
        location: String,
        #[serde(default)]
        playlist: Option<NodeFixture>,
    },
}

/// The host side of the page.
#[derive(Debug, Clone)]
pub struct HostPage {
    doc: SharedDocument,
    selectors: PlaylistSelectors,
    theme_source: Selector,
    active_class: String,
}

impl HostPage {
    pub fn new(doc: SharedDocument, settings: &SelectorSettings) -> Result<Self, SelectorError> {
        Ok(Self {
            doc,
            selectors: PlaylistSelectors::from_settings(settings)?,
            theme_source: settings.theme_source.parse()?,
            active_class: settings.active_class.clone(),
        })
    }

    pub async fn play(&self, step: &Step) -> Result<(), ReplayError> {
        debug!(?step, "replaying");
        match step {
            Step::Wait { ms } => {
                time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }
            Step::Activate { index } => self.activate(*index),
            Step::Theme { href } => self.set_theme(href),
            Step::Navigate { location, playlist } => self.navigate(location, playlist.as_ref()),
        }
    }

    /// Moves the active class onto item `index`.
    pub fn activate(&self, index: usize) -> Result<(), ReplayError> {
        let mut doc = self.doc.lock();
        let container = extract::find_container(&doc, &self.selectors).ok_or(ReplayError::NoPlaylist)?;
        let items = doc.query_selector_all(container, &self.selectors.item);
        let target = *items.get(index).ok_or(ReplayError::NoItem {
            index,
            count: items.len(),
        })?;
        for item in items.iter().filter(|i| **i != target) {
            doc.remove_class(*item, &self.active_class);
        }
        doc.add_class(target, &self.active_class);
        Ok(())
    }

    pub fn set_theme(&self, href: &str) -> Result<(), ReplayError> {
        let mut doc = self.doc.lock();
        let link = doc
            .query_selector(doc.root(), &self.theme_source)
            .ok_or(ReplayError::NoThemeSource)?;
        doc.set_attribute(link, "href", href);
        Ok(())
    }

    /// Changes the address and re-renders: the old playlist container is
    /// replaced by `playlist` when given, otherwise the page just gains a node.
    pub fn navigate(&self, location: &str, playlist: Option<&NodeFixture>) -> Result<(), ReplayError> {
        let mut doc = self.doc.lock();
        doc.set_location(location);
        let root = doc.root();
        match (playlist, extract::find_container(&doc, &self.selectors)) {
            (Some(fixture), Some(old)) => {
                let parent = doc.parent(old).unwrap_or(root);
                let new = doc.build(parent, fixture)?;
                doc.insert_before(old, new)?;
                doc.remove(old);
            }
            (Some(fixture), None) => {
                doc.build(root, fixture)?;
            }
            (None, _) => {
                let marker = doc.create_element("div");
                doc.append_child(root, marker)?;
            }
        }
        Ok(())
    }
}
